// Copyright 2026 Jordan Castro <jordan@grupojvm.com>
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the License for the specific language governing permissions and limitations under the License.
//
//! Method injection, deferral and dispatch up the class chain.

use std::ffi::c_void;

use mlua::prelude::*;
use tracing::{debug, trace};

use crate::{
    lua::{
        INDEX, INIT, NEWINDEX, SuperFrame,
        class::{class_name, class_of, parent_of},
        object::index,
        with_state,
    },
    shared::{
        error::Result,
        func::{Injected, Previous},
    },
};

/// Replaces method `method` of `class` with a closure over `f` that captures
/// the previous value (nil, a function or a table) as its `Previous`.
///
/// Injecting the same method again wraps the previous injection.
pub fn inject_method(lua: &Lua, class: &LuaTable, method: &str, f: Injected) -> Result<()> {
    let prev = Previous::new(class.raw_get::<LuaValue>(method)?);
    let kind = prev.value().type_name();
    let function = lua.create_function(move |lua, args: LuaMultiValue| f(lua, &prev, args))?;
    class.raw_set(method, function)?;
    debug!(class = %class_name(class).unwrap_or_default(), method, previous = kind, "injected method");
    Ok(())
}

/// Replaces the `__index` of a class, see `inject_method`.
pub fn inject_index(lua: &Lua, class: &LuaTable, f: Injected) -> Result<()> {
    inject_method(lua, class, INDEX, f)
}

/// Replaces the `__newindex` of a class, see `inject_method`.
pub fn inject_newindex(lua: &Lua, class: &LuaTable, f: Injected) -> Result<()> {
    inject_method(lua, class, NEWINDEX, f)
}

/// From an injected `__index`, look `key` up the way the replaced `__index`
/// would have: call it when it is a function, index it when it is a table.
pub fn defer_index(prev: &Previous, object: LuaValue, key: LuaValue) -> Result<LuaValue> {
    trace!(previous = prev.value().type_name(), "deferring index");
    match prev.value() {
        LuaValue::Function(index) => Ok(index.call::<LuaValue>((object, key))?),
        LuaValue::Table(index) => Ok(index.get::<LuaValue>(key)?),
        _ => Ok(LuaValue::Nil),
    }
}

/// From an injected `__newindex`, hand the assignment to the replaced
/// `__newindex`. Does nothing when there was none.
pub fn defer_newindex(prev: &Previous, object: LuaValue, key: LuaValue, value: LuaValue) -> Result<()> {
    trace!(previous = prev.value().type_name(), "deferring newindex");
    match prev.value() {
        LuaValue::Function(newindex) => newindex.call::<()>((object, key, value))?,
        LuaValue::Table(target) => target.set(key, value)?,
        _ => {}
    }
    Ok(())
}

/// Calls the method `name` of the nearest class above the running one that
/// defines it directly, with `args` (receiver first). Returns exactly
/// `nresults` values, nils when no ancestor defines `name`.
///
/// The running class is found from the function actually executing: the
/// innermost function on the call stack that is a super dispatch in flight for
/// this receiver, or else the `name` entry of a class on the receiver's chain.
/// Called from outside any method, the class that owns the method the receiver
/// resolves `name` to is used. A class that overrides `name` and calls super
/// therefore never re-enters itself, and a fresh `self:name()` from inside a
/// dispatched method starts over from its own class.
pub fn call_super(lua: &Lua, name: &str, nresults: usize, args: LuaMultiValue) -> Result<LuaMultiValue> {
    dispatch_super(lua, name, Some(nresults), args)
}

/// Like `call_super`, keeping every value the parent method returns.
pub fn call_super_all(lua: &Lua, name: &str, args: LuaMultiValue) -> Result<LuaMultiValue> {
    dispatch_super(lua, name, None, args)
}

fn dispatch_super(lua: &Lua, name: &str, nresults: Option<usize>, args: LuaMultiValue) -> Result<LuaMultiValue> {
    let receiver = args.front().cloned().unwrap_or(LuaValue::Nil);
    let Some(own) = class_of(&receiver)? else {
        return Ok(nils(nresults));
    };
    let identity = receiver.to_pointer();

    let running = match running_class(lua, &own, identity, name)? {
        Some(class) => Some(class),
        None => owner(&own, name)?,
    };
    let Some(running) = running else {
        return Ok(nils(nresults));
    };

    let mut cursor = parent_of(&running)?;
    let mut found = None;
    while let Some(class) = cursor {
        if let LuaValue::Function(method) = class.raw_get::<LuaValue>(name)? {
            found = Some((class, method));
            break;
        }
        cursor = parent_of(&class)?;
    }
    let Some((class, method)) = found else {
        trace!(method = name, "no parent defines method");
        return Ok(nils(nresults));
    };
    trace!(method = name, class = %class_name(&class).unwrap_or_default(), "super dispatch");

    with_state(lua, |state| {
        state.frames.push(SuperFrame {
            receiver: identity,
            method: name.to_string(),
            class,
            function: method.clone(),
        })
    });
    let result = method.call::<LuaMultiValue>(args);
    with_state(lua, |state| {
        state.frames.pop();
    });

    Ok(fit(result?, nresults))
}

/// The class whose `name` method is executing, judged from the call stack.
fn running_class(lua: &Lua, own: &LuaTable, receiver: *const c_void, name: &str) -> Result<Option<LuaTable>> {
    // Innermost first.
    let dispatched: Vec<(LuaFunction, LuaTable)> = with_state(lua, |state| {
        state
            .frames
            .iter()
            .rev()
            .filter(|frame| frame.receiver == receiver && frame.method == name)
            .map(|frame| (frame.function.clone(), frame.class.clone()))
            .collect()
    });

    let mut level = 0;
    while let Some(function) = lua.inspect_stack(level, |debug| debug.function()) {
        // A function shared by several classes runs as the class it was dispatched to.
        if let Some((_, class)) = dispatched.iter().find(|(dispatched, _)| *dispatched == function) {
            return Ok(Some(class.clone()));
        }
        if let Some(class) = defining_class(own, name, &function)? {
            return Ok(Some(class));
        }
        level += 1;
    }
    Ok(None)
}

/// The first class, from `class` upward, whose raw `name` is `function`.
fn defining_class(class: &LuaTable, name: &str, function: &LuaFunction) -> Result<Option<LuaTable>> {
    let mut cursor = Some(class.clone());
    while let Some(current) = cursor {
        if let LuaValue::Function(method) = current.raw_get::<LuaValue>(name)? {
            if method == *function {
                return Ok(Some(current));
            }
        }
        cursor = parent_of(&current)?;
    }
    Ok(None)
}

/// Calls `__init` of the parent class with `args`, see `call_super`.
pub fn super_init(lua: &Lua, args: LuaMultiValue) -> Result<()> {
    call_super(lua, INIT, 0, args)?;
    Ok(())
}

/// The first class, from `class` upward, that defines `name` directly.
fn owner(class: &LuaTable, name: &str) -> Result<Option<LuaTable>> {
    let mut cursor = Some(class.clone());
    while let Some(current) = cursor {
        if !current.raw_get::<LuaValue>(name)?.is_nil() {
            return Ok(Some(current));
        }
        cursor = parent_of(&current)?;
    }
    Ok(None)
}

fn nils(n: Option<usize>) -> LuaMultiValue {
    LuaMultiValue::from_vec(vec![LuaValue::Nil; n.unwrap_or(0)])
}

/// Pad with nils or truncate to exactly `n` values.
fn fit(values: LuaMultiValue, n: Option<usize>) -> LuaMultiValue {
    let Some(n) = n else {
        return values;
    };
    let mut values = values.into_vec();
    values.resize(n, LuaValue::Nil);
    LuaMultiValue::from_vec(values)
}

/// `name` as seen from the class `depth` levels above the class of `object`
/// (0 is the object's own class). Nil when the chain is shorter than that.
pub fn get_parent_field(object: &LuaValue, depth: usize, name: &str) -> Result<LuaValue> {
    let mut class = class_of(object)?;
    for _ in 0..depth {
        class = match class {
            Some(class) => parent_of(&class)?,
            None => break,
        };
    }
    match class {
        Some(class) => Ok(class.get::<LuaValue>(name)?),
        None => Ok(LuaValue::Nil),
    }
}

/// Calls `object:method(args...)`. Errors raised by the method come back as `Err`.
pub fn call_method(object: &LuaValue, method: &str, args: LuaMultiValue) -> Result<LuaMultiValue> {
    let function = match index(object, method)? {
        LuaValue::Function(function) => function,
        other => {
            return Err(mlua::Error::RuntimeError(format!(
                "attempt to call method '{method}' (a {} value)",
                other.type_name()
            ))
            .into());
        }
    };
    let mut frame = args;
    frame.push_front(object.clone());
    Ok(function.call::<LuaMultiValue>(frame)?)
}

