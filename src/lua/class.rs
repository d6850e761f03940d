// Copyright 2026 Jordan Castro <jordan@grupojvm.com>
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the License for the specific language governing permissions and limitations under the License.
//
//! Class tables, the class registry and the class predicates.
//!
//! A registered class is always a table. Its raw fields hold its methods plus
//! `__name`, `__class` (itself), `__index` (itself, so the table can serve as
//! the metatable of scripted instances, or a function when the parent's
//! `__index` was injected) and `__parent`. Its metatable holds
//! `__name`, `__class`, `__index` (the parent class) and `__call`.

use std::collections::HashSet;

use mlua::prelude::*;
use tracing::{debug, warn};

use crate::{
    lua::{
        CALL, CLASS, INDEX, NAME, NEWINDEX, PARENT, REGISTRY_KEY, UCLASS, USER_CTOR, object,
    },
    shared::{
        class::{ClassDesc, Method},
        error::{ClassError, Result},
    },
};

/// Metamethods copied from a parent class into a child that does not define
/// them. Lua reads metamethods raw, so without this a scripted instance of a
/// subclass would lose them.
const INHERITED_METAMETHODS: &[&str] = &[
    "__tostring", "__len", "__eq", "__lt", "__le", "__concat", "__call", "__close", "__unm",
    "__add", "__sub", "__mul", "__div", "__mod", "__pow", "__idiv", "__band", "__bor", "__bxor",
    "__shl", "__shr", "__bnot",
];

/// Get the class registry, creating it on first use.
pub fn registry(lua: &Lua) -> Result<LuaTable> {
    if let Some(registry) = lua.named_registry_value::<Option<LuaTable>>(REGISTRY_KEY)? {
        return Ok(registry);
    }
    let registry = lua.create_table()?;
    lua.set_named_registry_value(REGISTRY_KEY, registry.clone())?;
    Ok(registry)
}

/// The class registered under `name`.
pub fn get_class(lua: &Lua, name: &str) -> Result<Option<LuaTable>> {
    Ok(registry(lua)?.raw_get(name)?)
}

/// Like `get_class`, but a missing class is an error.
pub fn require_class(lua: &Lua, name: &str) -> Result<LuaTable> {
    get_class(lua, name)?.ok_or_else(|| ClassError::MissingClass(name.to_string()))
}

/// Is `value` a class table?
pub fn is_class(value: &LuaValue) -> bool {
    match value {
        LuaValue::Table(table) => is_class_table(table),
        _ => false,
    }
}

pub(crate) fn is_class_table(table: &LuaTable) -> bool {
    let Some(mt) = table.metatable() else {
        return false;
    };
    let named = matches!(mt.raw_get::<LuaValue>(NAME), Ok(LuaValue::String(_)));
    let own = match mt.raw_get::<LuaValue>(CLASS) {
        Ok(LuaValue::Table(class)) => class == *table,
        _ => false,
    };
    named && own
}

/// The class of an instance, `None` when `value` is not an instance.
///
/// For scripted instances this is `getmetatable(value).__class`, for native
/// instances the same field of the fields table's metatable.
pub fn class_of(value: &LuaValue) -> Result<Option<LuaTable>> {
    let mt = match value {
        LuaValue::Table(table) => table.metatable(),
        LuaValue::UserData(ud) => match object::fields(ud)? {
            Some(fields) => fields.metatable(),
            None => None,
        },
        _ => None,
    };
    let Some(mt) = mt else {
        return Ok(None);
    };
    match mt.raw_get::<LuaValue>(CLASS)? {
        LuaValue::Table(class) if is_class_table(&class) => {
            // A class table's own metatable points back at itself.
            if let LuaValue::Table(table) = value {
                if class == *table {
                    return Ok(None);
                }
            }
            Ok(Some(class))
        }
        _ => Ok(None),
    }
}

/// Is `value` an instance of some class?
pub fn is_object(value: &LuaValue) -> bool {
    matches!(class_of(value), Ok(Some(_)))
}

/// Is `value` an instance of `name` or of one of its subclasses?
pub fn is_instance(lua: &Lua, value: &LuaValue, name: &str) -> Result<bool> {
    let Some(target) = get_class(lua, name)? else {
        return Ok(false);
    };
    let mut cursor = class_of(value)?;
    while let Some(class) = cursor {
        if class == target {
            return Ok(true);
        }
        cursor = parent_of(&class)?;
    }
    Ok(false)
}

/// The parent class table of a class table.
pub fn parent_of(class: &LuaTable) -> Result<Option<LuaTable>> {
    Ok(class.raw_get(PARENT)?)
}

/// The registered name of a class table.
pub fn class_name(class: &LuaTable) -> Result<String> {
    match class.raw_get::<Option<String>>(NAME)? {
        Some(name) => Ok(name),
        None => Err(ClassError::MissingName),
    }
}

/// The native descriptor behind a class table (or a descriptor userdata).
pub fn get_uclass(value: &LuaValue) -> Result<Option<LuaUserDataRef<ClassDesc>>> {
    let ud = match value {
        LuaValue::Table(table) => match table.raw_get::<LuaValue>(UCLASS)? {
            LuaValue::UserData(ud) => ud,
            _ => return Ok(None),
        },
        LuaValue::UserData(ud) => ud.clone(),
        _ => return Ok(None),
    };
    if !ud.is::<ClassDesc>() {
        return Ok(None);
    }
    Ok(Some(ud.borrow::<ClassDesc>()?))
}

/// How a pending class names its parent.
enum ParentRef {
    Root,
    Name(String),
    Class(LuaValue),
}

/// A class value waiting to be inserted into the registry.
struct Pending {
    name: String,
    value: LuaValue,
    user_ctor: bool,
}

/// Read the name, parent and `user_ctor` of a class value that may not be registered yet.
fn describe(value: &LuaValue) -> Result<(Pending, ParentRef)> {
    match value {
        LuaValue::Table(table) => {
            let name = match table.raw_get::<LuaValue>(NAME)? {
                LuaValue::String(name) => name.to_string_lossy(),
                _ => return Err(ClassError::MissingName),
            };
            let parent = match table.raw_get::<LuaValue>(PARENT)? {
                LuaValue::Nil => ParentRef::Root,
                LuaValue::String(parent) => ParentRef::Name(parent.to_string_lossy()),
                parent @ LuaValue::Table(_) => ParentRef::Class(parent),
                other => return Err(ClassError::NotAClass(other.type_name().to_string())),
            };
            let user_ctor = !matches!(table.raw_get::<LuaValue>(USER_CTOR)?, LuaValue::Boolean(false));
            Ok((Pending { name, value: value.clone(), user_ctor }, parent))
        }
        LuaValue::UserData(ud) if ud.is::<ClassDesc>() => {
            let desc = ud.borrow::<ClassDesc>()?;
            if desc.name.is_empty() {
                return Err(ClassError::MissingName);
            }
            let parent = match &desc.parent {
                Some(parent) => ParentRef::Name(parent.clone()),
                None => ParentRef::Root,
            };
            Ok((
                Pending { name: desc.name.clone(), value: value.clone(), user_ctor: desc.user_ctor },
                parent,
            ))
        }
        other => Err(ClassError::NotAClass(other.type_name().to_string())),
    }
}

/// Adds the class `value` to the registry, along with any parents that are not
/// registered yet, and returns its class table.
///
/// `value` is either a scripted class table (raw `__name`, optional `__parent`
/// given as a class table or a registered name, optional `__user_ctor`) or a
/// `ClassDesc` userdata. Registering a name that is already present is a
/// no-op returning the registered class. Nothing is inserted when the parent
/// chain is broken or loops.
pub fn register_class(lua: &Lua, value: &LuaValue) -> Result<LuaTable> {
    let registry = registry(lua)?;

    // Walk up the declared chain until we hit a registered class or a root.
    let mut chain: Vec<Pending> = vec![];
    let mut seen: HashSet<String> = HashSet::new();
    let mut current = value.clone();
    loop {
        let (pending, parent) = describe(&current)?;
        if let Some(existing) = registry.raw_get::<Option<LuaTable>>(pending.name.as_str())? {
            if chain.is_empty() {
                return Ok(existing);
            }
            break;
        }
        if !seen.insert(pending.name.clone()) {
            return Err(ClassError::Cycle(pending.name));
        }
        let name = pending.name.clone();
        chain.push(pending);
        match parent {
            ParentRef::Root => break,
            ParentRef::Name(parent) => {
                if seen.contains(&parent) {
                    return Err(ClassError::Cycle(parent));
                }
                if registry.raw_get::<Option<LuaTable>>(parent.as_str())?.is_none() {
                    return Err(ClassError::UnresolvedParent { class: name, parent });
                }
                break;
            }
            ParentRef::Class(parent) => current = parent,
        }
    }

    // Insert base first so every class finds its parent registered.
    let mut class = None;
    for pending in chain.into_iter().rev() {
        class = Some(install(lua, &registry, pending)?);
    }
    match class {
        Some(class) => Ok(class),
        None => Err(ClassError::MissingName),
    }
}

/// Turn a pending class into a registered class table.
fn install(lua: &Lua, registry: &LuaTable, pending: Pending) -> Result<LuaTable> {
    let Pending { name, value, user_ctor } = pending;

    let (class, parent_name, methods) = match &value {
        LuaValue::Table(table) => {
            let parent_name = match table.raw_get::<LuaValue>(PARENT)? {
                LuaValue::String(parent) => Some(parent.to_string_lossy()),
                LuaValue::Table(parent) => Some(class_name(&parent)?),
                _ => None,
            };
            (table.clone(), parent_name, vec![])
        }
        LuaValue::UserData(ud) => {
            let desc = ud.borrow::<ClassDesc>()?;
            let class = lua.create_table()?;
            class.raw_set(UCLASS, ud.clone())?;
            (class, desc.parent.clone(), desc.methods.clone())
        }
        other => return Err(ClassError::NotAClass(other.type_name().to_string())),
    };

    let parent = match &parent_name {
        Some(parent) => Some(registry.raw_get::<Option<LuaTable>>(parent.as_str())?.ok_or_else(
            || ClassError::UnresolvedParent { class: name.clone(), parent: parent.clone() },
        )?),
        None => None,
    };

    class.raw_set(NAME, name.as_str())?;
    class.raw_set(CLASS, class.clone())?;
    if class.raw_get::<LuaValue>(INDEX)?.is_nil() {
        // A handler injected into the parent keeps answering for the child.
        match &parent {
            Some(parent) if matches!(parent.raw_get::<LuaValue>(INDEX)?, LuaValue::Function(_)) => {
                class.raw_set(INDEX, inherited_index(lua, &class, parent)?)?
            }
            _ => class.raw_set(INDEX, class.clone())?,
        }
    }
    if class.raw_get::<LuaValue>(NEWINDEX)?.is_nil() {
        if let Some(parent) = &parent {
            if let LuaValue::Function(newindex) = parent.raw_get::<LuaValue>(NEWINDEX)? {
                class.raw_set(NEWINDEX, newindex)?;
            }
        }
    }
    match &parent {
        Some(parent) => class.raw_set(PARENT, parent.clone())?,
        None => class.raw_set(PARENT, LuaValue::Nil)?,
    }

    add_methods(lua, &class, &name, &methods)?;

    if let Some(parent) = &parent {
        for meta in INHERITED_METAMETHODS {
            if class.raw_get::<LuaValue>(*meta)?.is_nil() {
                let inherited: LuaValue = parent.raw_get(*meta)?;
                if !inherited.is_nil() {
                    class.raw_set(*meta, inherited)?;
                }
            }
        }
    }

    let mt = match class.metatable() {
        Some(mt) => mt,
        None => lua.create_table()?,
    };
    mt.raw_set(NAME, name.as_str())?;
    mt.raw_set(CLASS, class.clone())?;
    match &parent {
        Some(parent) => mt.raw_set(INDEX, parent.clone())?,
        None => mt.raw_set(INDEX, LuaValue::Nil)?,
    }
    mt.raw_set(CALL, constructor_trampoline(lua, &name, user_ctor)?)?;
    class.set_metatable(Some(mt))?;

    registry.raw_set(name.as_str(), class.clone())?;
    let native = get_uclass(&value)?.is_some_and(|desc| desc.is_native());
    debug!(class = %name, parent = ?parent_name, native, "registered class");

    Ok(class)
}

/// Merge native methods into a class table without replacing what is there.
fn add_methods(lua: &Lua, class: &LuaTable, name: &str, methods: &[(String, Method)]) -> Result<()> {
    for (method_name, method) in methods.iter() {
        if !class.raw_get::<LuaValue>(method_name.as_str())?.is_nil() {
            warn!(class = %name, method = %method_name, "method already defined, keeping existing one");
            continue;
        }
        let method = *method;
        let function = lua.create_function(move |lua, args: LuaMultiValue| method(lua, args))?;
        class.raw_set(method_name.as_str(), function)?;
    }
    Ok(())
}

/// The `__index` of a class whose parent answers lookups with a function:
/// the class's own entries first, then whatever the parent's `__index` is now.
fn inherited_index(lua: &Lua, class: &LuaTable, parent: &LuaTable) -> Result<LuaFunction> {
    let class = class.clone();
    let parent = parent.clone();
    let function = lua.create_function(move |_, (object, key): (LuaValue, LuaValue)| {
        let own: LuaValue = class.raw_get(key.clone())?;
        if !own.is_nil() {
            return Ok(own);
        }
        match parent.raw_get::<LuaValue>(INDEX)? {
            LuaValue::Function(index) => index.call::<LuaValue>((object, key)),
            LuaValue::Table(index) => index.get::<LuaValue>(key),
            _ => Ok(LuaValue::Nil),
        }
    })?;
    Ok(function)
}

/// The `__call` of a class metatable.
fn constructor_trampoline(lua: &Lua, name: &str, user_ctor: bool) -> Result<LuaFunction> {
    let name = name.to_string();
    let function = lua.create_function(move |lua, (_class, args): (LuaValue, LuaMultiValue)| {
        if !user_ctor {
            return Err(ClassError::NotCallable(name.clone()).into());
        }
        Ok(object::construct(lua, &name, args)?)
    })?;
    Ok(function)
}

/// Creates and registers the native class described by `desc`.
pub fn register_native(lua: &Lua, desc: ClassDesc) -> Result<LuaTable> {
    let ud = lua.create_userdata(desc)?;
    register_class(lua, &LuaValue::UserData(ud))
}

/// Creates and registers a simple class with methods, constructible by call,
/// without an allocator or destructor. `parent` must already be registered.
pub fn new_class(lua: &Lua, name: &str, parent: Option<&str>, methods: &[(&str, Method)]) -> Result<LuaTable> {
    let mut desc = ClassDesc::new(name);
    desc.parent = parent.map(str::to_string);
    for (method_name, method) in methods {
        desc = desc.with_method(method_name, *method);
    }
    register_native(lua, desc)
}
