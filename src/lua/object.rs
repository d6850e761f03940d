// Copyright 2026 Jordan Castro <jordan@grupojvm.com>
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the License for the specific language governing permissions and limitations under the License.
//
use std::any::Any;

use mlua::prelude::*;
use tracing::debug;

use crate::{
    lua::{
        FIELDS_SLOT, INDEX, INIT, NEWINDEX,
        class::{class_name, class_of, get_uclass, is_instance, parent_of, require_class},
    },
    shared::{
        class::Destructor,
        error::{ClassError, Result},
    },
};

/// A native instance.
///
/// Holds the opaque block produced by the class allocator. The fields visible
/// to Lua live in user value 1, a table whose metatable is the class table.
/// The two never mix.
pub struct Object {
    /// Name of the class this was constructed as.
    class: String,
    /// The opaque block.
    data: Box<dyn Any>,
    /// Destructors of the native classes on the chain, most derived first.
    destructors: Vec<Destructor>,
}

impl Object {
    pub fn class_name(&self) -> &str {
        &self.class
    }
}

impl Drop for Object {
    fn drop(&mut self) {
        for gc in self.destructors.iter() {
            gc(self.data.as_mut());
        }
    }
}

impl LuaUserData for Object {
    fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_function(LuaMetaMethod::Index, |_, (ud, key): (LuaAnyUserData, LuaValue)| {
            Ok(object_index(&ud, key)?)
        });
        methods.add_meta_function(
            LuaMetaMethod::NewIndex,
            |_, (ud, key, value): (LuaAnyUserData, LuaValue, LuaValue)| Ok(object_newindex(&ud, key, value)?),
        );
        methods.add_meta_function(LuaMetaMethod::ToString, |_, ud: LuaAnyUserData| Ok(object_tostring(&ud)?));

        // Everything else goes to the class table, the same place Lua looks
        // for the metamethods of scripted instances.
        let forwarded = [
            (LuaMetaMethod::Call, "__call"),
            (LuaMetaMethod::Len, "__len"),
            (LuaMetaMethod::Eq, "__eq"),
            (LuaMetaMethod::Lt, "__lt"),
            (LuaMetaMethod::Le, "__le"),
            (LuaMetaMethod::Concat, "__concat"),
            (LuaMetaMethod::Unm, "__unm"),
            (LuaMetaMethod::Add, "__add"),
            (LuaMetaMethod::Sub, "__sub"),
            (LuaMetaMethod::Mul, "__mul"),
            (LuaMetaMethod::Div, "__div"),
            (LuaMetaMethod::Mod, "__mod"),
            (LuaMetaMethod::Pow, "__pow"),
            (LuaMetaMethod::IDiv, "__idiv"),
        ];
        for (meta, name) in forwarded {
            methods.add_meta_function(meta, move |_, args: LuaMultiValue| Ok(forward(name, args)?));
        }
    }
}

/// The fields table of a native instance.
pub(crate) fn fields(ud: &LuaAnyUserData) -> Result<Option<LuaTable>> {
    if !ud.is::<Object>() {
        return Ok(None);
    }
    match ud.nth_user_value::<LuaValue>(FIELDS_SLOT)? {
        LuaValue::Table(fields) => Ok(Some(fields)),
        _ => Ok(None),
    }
}

fn object_index(ud: &LuaAnyUserData, key: LuaValue) -> Result<LuaValue> {
    let Some(fields) = fields(ud)? else {
        return Ok(LuaValue::Nil);
    };
    let value: LuaValue = fields.raw_get(key.clone())?;
    if !value.is_nil() {
        return Ok(value);
    }
    let Some(class) = fields.metatable() else {
        return Ok(LuaValue::Nil);
    };
    match class.raw_get::<LuaValue>(INDEX)? {
        LuaValue::Function(index) => Ok(index.call::<LuaValue>((ud.clone(), key))?),
        LuaValue::Table(index) => Ok(index.get::<LuaValue>(key)?),
        _ => Ok(LuaValue::Nil),
    }
}

fn object_newindex(ud: &LuaAnyUserData, key: LuaValue, value: LuaValue) -> Result<()> {
    let Some(fields) = fields(ud)? else {
        return Err(mlua::Error::RuntimeError("object has no fields table".to_string()).into());
    };
    let present = !fields.raw_get::<LuaValue>(key.clone())?.is_nil();
    let handler = match fields.metatable() {
        Some(class) if !present => class.raw_get::<LuaValue>(NEWINDEX)?,
        _ => LuaValue::Nil,
    };
    match handler {
        LuaValue::Function(newindex) => newindex.call::<()>((ud.clone(), key, value))?,
        LuaValue::Table(target) => target.set(key, value)?,
        _ => fields.raw_set(key, value)?,
    }
    Ok(())
}

fn object_tostring(ud: &LuaAnyUserData) -> Result<String> {
    let value = LuaValue::UserData(ud.clone());
    let Some(class) = class_of(&value)? else {
        return Ok(format!("object: {:p}", ud.to_pointer()));
    };
    match class.raw_get::<LuaValue>("__tostring")? {
        LuaValue::Function(tostring) => Ok(tostring.call::<String>(ud.clone())?),
        _ => Ok(format!("{}: {:p}", class_name(&class)?, ud.to_pointer())),
    }
}

fn forward(name: &str, args: LuaMultiValue) -> Result<LuaMultiValue> {
    // Binary operators may have the object on either side.
    let mut class = None;
    for arg in args.iter().take(2) {
        if let LuaValue::UserData(ud) = arg {
            if ud.is::<Object>() {
                class = class_of(arg)?;
                if class.is_some() {
                    break;
                }
            }
        }
    }
    let handler = match &class {
        Some(class) => class.raw_get::<LuaValue>(name)?,
        None => LuaValue::Nil,
    };
    match handler {
        LuaValue::Function(handler) => Ok(handler.call::<LuaMultiValue>(args)?),
        // Lua only asks for __eq when the operands are not raw equal.
        _ if name == "__eq" => Ok(LuaMultiValue::from_vec(vec![LuaValue::Boolean(false)])),
        _ => {
            let class = match &class {
                Some(class) => class_name(class)?,
                None => "unknown".to_string(),
            };
            Err(mlua::Error::RuntimeError(format!("class '{class}' does not define '{name}'")).into())
        }
    }
}

/// Construct an instance of the class registered under `name`.
///
/// `args` are passed to `__init` after the new instance.
pub fn construct(lua: &Lua, name: &str, args: LuaMultiValue) -> Result<LuaValue> {
    let class = require_class(lua, name)?;
    construct_class(lua, &class, args)
}

/// Construct an instance of a registered class table.
///
/// The nearest allocator on the chain (the class itself first) runs once.
/// Without one the instance is a plain table. `__init` is looked up through
/// the chain and skipped when missing; its errors propagate and the half
/// built instance is left to the collector.
pub fn construct_class(lua: &Lua, class: &LuaTable, args: LuaMultiValue) -> Result<LuaValue> {
    let name = class_name(class)?;

    let mut alloc = None;
    let mut destructors: Vec<Destructor> = vec![];
    let mut cursor = Some(class.clone());
    while let Some(current) = cursor {
        if let Some(desc) = get_uclass(&LuaValue::Table(current.clone()))? {
            if alloc.is_none() {
                alloc = desc.alloc;
            }
            if let Some(gc) = desc.gc {
                destructors.push(gc);
            }
        }
        cursor = parent_of(&current)?;
    }

    let instance = match alloc {
        Some(alloc) => {
            let data = alloc(lua)?;
            let fields = lua.create_table()?;
            fields.set_metatable(Some(class.clone()))?;
            let ud = lua.create_userdata(Object { class: name.clone(), data, destructors })?;
            ud.set_nth_user_value(FIELDS_SLOT, fields)?;
            LuaValue::UserData(ud)
        }
        None => {
            let table = lua.create_table()?;
            table.set_metatable(Some(class.clone()))?;
            LuaValue::Table(table)
        }
    };
    debug!(class = %name, native = alloc.is_some(), "constructed instance");

    if let LuaValue::Function(init) = class.get::<LuaValue>(INIT)? {
        let mut frame = args;
        frame.push_front(instance.clone());
        init.call::<()>(frame)?;
    }

    Ok(instance)
}

/// Check that argument `arg` is a native instance of `name` (or a subclass)
/// and return it. Use `with_data` to reach its opaque block.
pub fn check_uclass(lua: &Lua, value: &LuaValue, arg: usize, name: &str) -> Result<LuaAnyUserData> {
    if let LuaValue::UserData(ud) = value {
        if ud.is::<Object>() && is_instance(lua, value, name)? {
            return Ok(ud.clone());
        }
    }
    let got = match class_of(value)? {
        Some(class) => class_name(&class)?,
        None => value.type_name().to_string(),
    };
    Err(ClassError::BadArgument { arg, expected: name.to_string(), got })
}

/// Run `f` on the opaque block of a native instance.
pub fn with_data<T: 'static, R>(ud: &LuaAnyUserData, f: impl FnOnce(&mut T) -> R) -> Result<R> {
    let mut object = ud.borrow_mut::<Object>()?;
    let class = object.class.clone();
    match object.data.as_mut().downcast_mut::<T>() {
        Some(data) => Ok(f(data)),
        None => Err(ClassError::NotNative(class)),
    }
}

/// `value[key]` for scripted and native instances alike.
pub fn index(value: &LuaValue, key: impl IntoLua) -> Result<LuaValue> {
    match value {
        LuaValue::Table(table) => Ok(table.get::<LuaValue>(key)?),
        LuaValue::UserData(ud) => Ok(ud.get::<LuaValue>(key)?),
        other => Err(mlua::Error::RuntimeError(format!("attempt to index a {} value", other.type_name())).into()),
    }
}

/// `value[key] = v` for scripted and native instances alike.
pub fn set_index(value: &LuaValue, key: impl IntoLua, v: impl IntoLua) -> Result<()> {
    match value {
        LuaValue::Table(table) => Ok(table.set(key, v)?),
        LuaValue::UserData(ud) => Ok(ud.set(key, v)?),
        other => Err(mlua::Error::RuntimeError(format!("attempt to index a {} value", other.type_name())).into()),
    }
}

/// Store straight into the fields of an instance, skipping `__newindex`.
///
/// Injected `__newindex` handlers use this to keep the default behavior for
/// the keys they do not intercept.
pub fn rawset_field(value: &LuaValue, key: impl IntoLua, v: impl IntoLua) -> Result<bool> {
    match value {
        LuaValue::Table(table) => {
            table.raw_set(key, v)?;
            Ok(true)
        }
        LuaValue::UserData(ud) => match fields(ud)? {
            Some(fields) => {
                fields.raw_set(key, v)?;
                Ok(true)
            }
            None => Ok(false),
        },
        _ => Ok(false),
    }
}
