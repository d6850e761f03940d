// Copyright 2026 Jordan Castro <jordan@grupojvm.com>
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the License for the specific language governing permissions and limitations under the License.
//
//! Classes for embedded Lua.
//!
//! Adds a class registry, single inheritance, native and scripted instances,
//! method injection and parent dispatch on top of an `mlua` interpreter. The
//! same classes can be defined from Rust (`ClassDesc`) or from Lua (a table
//! with `__name` and an optional `__parent`) and derive from each other.
//!
//! example:
//! ```no_run
//! use mlua::prelude::*;
//! use luaclass::{ClassDesc, lua::object::construct};
//!
//! fn area(lua: &Lua, args: LuaMultiValue) -> LuaResult<LuaMultiValue> {
//!     let this: LuaTable = lua.unpack_multi(args)?;
//!     let w: f64 = this.get("w")?;
//!     let h: f64 = this.get("h")?;
//!     (w * h).into_lua_multi(lua)
//! }
//!
//! # fn main() -> luaclass::Result<()> {
//! let lua = Lua::new();
//! luaclass::open_with(&lua, &luaclass::Options::default(), vec![ClassDesc::new("Rect").with_method("area", area)])?;
//! lua.load("local r = Rect() r.w = 2 r.h = 3 assert(r:area() == 6)").exec()?;
//! # Ok(())
//! # }
//! ```

pub mod lua;
pub mod shared;

use mlua::{Lua, Table};

pub use lua::{
    class::{class_of, get_class, get_uclass, is_class, is_instance, is_object, new_class, register_class, register_native},
    func::{call_method, call_super, defer_index, defer_newindex, get_parent_field, inject_index, inject_method, inject_newindex, super_init},
    object::{check_uclass, construct, with_data},
};
pub use shared::{
    class::{Allocator, ClassDesc, Destructor, Method},
    error::{ClassError, Result},
    func::{Injected, Previous},
};

/// How `open_with` exposes the library to scripts.
#[derive(Debug, Clone)]
pub struct Options {
    /// Install `isobject`, `isclass`, `construct`, ... as globals.
    pub globals: bool,
    /// Name under which `require` finds the library, `None` to skip.
    pub module: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self { globals: true, module: Some("class".to_string()) }
    }
}

/// Current luaclass version.
pub fn version() -> u32 {
    0x00000100 // 0.1.0
}

/// Load the class library into `lua` with the default options.
pub fn open(lua: &Lua) -> Result<Table> {
    open_with(lua, &Options::default(), vec![])
}

/// Load the class library into `lua`, registering `seeds` first.
pub fn open_with(lua: &Lua, options: &Options, seeds: Vec<ClassDesc>) -> Result<Table> {
    lua::module::add_module(lua, options, seeds)
}
