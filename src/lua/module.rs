// Copyright 2026 Jordan Castro <jordan@grupojvm.com>
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the License for the specific language governing permissions and limitations under the License.
//
use mlua::prelude::*;
use tracing::debug;

use crate::{
    Options,
    lua::{
        class::{get_class, is_class, is_class_table, is_instance, is_object, register_class, register_native},
        func::call_super_all,
        object::{construct, construct_class},
    },
    shared::{class::ClassDesc, error::Result},
};

/// Build the table of functions scripts use.
fn create_library(lua: &Lua) -> Result<LuaTable> {
    let library = lua.create_table()?;

    library.set("isobject", lua.create_function(|_, value: LuaValue| Ok(is_object(&value)))?)?;
    library.set("isclass", lua.create_function(|_, value: LuaValue| Ok(is_class(&value)))?)?;
    library.set(
        "isinstance",
        lua.create_function(|lua, (value, name): (LuaValue, String)| Ok(is_instance(lua, &value, &name)?))?,
    )?;
    library.set(
        "construct",
        lua.create_function(|lua, (class, args): (LuaValue, LuaMultiValue)| match class {
            LuaValue::String(name) => Ok(construct(lua, &name.to_string_lossy(), args)?),
            LuaValue::Table(class) if is_class_table(&class) => {
                Ok(construct_class(lua, &class, args)?)
            }
            other => Err(LuaError::RuntimeError(format!(
                "bad argument #1 to 'construct' (class or class name expected, got {})",
                other.type_name()
            ))),
        })?,
    )?;
    library.set("getclass", lua.create_function(|lua, name: String| Ok(get_class(lua, &name)?))?)?;
    library.set(
        "registerclass",
        lua.create_function(|lua, class: LuaValue| Ok(register_class(lua, &class)?))?,
    )?;
    library.set(
        "super",
        lua.create_function(|lua, (name, args): (String, LuaMultiValue)| Ok(call_super_all(lua, &name, args)?))?,
    )?;

    Ok(library)
}

/// Register `seeds`, then expose the library (and, with globals, the seeded
/// classes) to scripts as `options` asks.
pub fn add_module(lua: &Lua, options: &Options, seeds: Vec<ClassDesc>) -> Result<LuaTable> {
    let mut classes = vec![];
    for seed in seeds {
        let name = seed.name.clone();
        classes.push((name, register_native(lua, seed)?));
    }

    let library = create_library(lua)?;

    if options.globals {
        let globals = lua.globals();
        for pair in library.pairs::<LuaValue, LuaValue>() {
            let (name, function) = pair?;
            globals.set(name, function)?;
        }
        // Seeded classes are reachable by name too.
        for (name, class) in classes {
            globals.set(name, class)?;
        }
    }

    if let Some(module) = &options.module {
        // Let's get the preload table
        let package: LuaTable = lua.globals().get("package")?;
        let preload: LuaTable = package.get("preload")?;

        let library_for_lua = library.clone();
        let loader = lua.create_function(move |_, _: LuaMultiValue| Ok(library_for_lua.clone()))?;
        preload.set(module.as_str(), loader)?;
    }

    debug!(globals = options.globals, module = ?options.module, "opened class library");
    Ok(library)
}
