// Copyright 2026 Jordan Castro <jordan@grupojvm.com>
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the License for the specific language governing permissions and limitations under the License.
//
//! Access to the tables stored in the user values of a userdata.
//!
//! Every helper works on user-value slot `uv` (1-based) of `ud`. The slot is
//! expected to hold a table. When it does not, getters return nil and setters
//! return `false`; nothing is written in either case.
//!
//! Raw variants bypass metatables, the others go through them.

use std::ffi::c_void;

use mlua::prelude::*;

use crate::shared::error::Result;

/// The table in slot `uv`, if that is what the slot holds.
fn slot(ud: &LuaAnyUserData, uv: usize) -> Result<Option<LuaTable>> {
    match ud.nth_user_value::<LuaValue>(uv)? {
        LuaValue::Table(table) => Ok(Some(table)),
        _ => Ok(None),
    }
}

fn pointer_key(p: *const c_void) -> LuaValue {
    LuaValue::LightUserData(LuaLightUserData(p as *mut c_void))
}

/// `ud[uv][key]`, raw.
pub fn uv_rawget(ud: &LuaAnyUserData, uv: usize, key: impl IntoLua) -> Result<LuaValue> {
    match slot(ud, uv)? {
        Some(table) => Ok(table.raw_get(key)?),
        None => Ok(LuaValue::Nil),
    }
}

/// `ud[uv][key] = value`, raw.
pub fn uv_rawset(ud: &LuaAnyUserData, uv: usize, key: impl IntoLua, value: impl IntoLua) -> Result<bool> {
    match slot(ud, uv)? {
        Some(table) => {
            table.raw_set(key, value)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// `ud[uv][p]` where `p` is used as a light userdata key, raw.
pub fn uv_rawgetp(ud: &LuaAnyUserData, uv: usize, p: *const c_void) -> Result<LuaValue> {
    uv_rawget(ud, uv, pointer_key(p))
}

/// `ud[uv][p] = value` where `p` is used as a light userdata key, raw.
pub fn uv_rawsetp(ud: &LuaAnyUserData, uv: usize, p: *const c_void, value: impl IntoLua) -> Result<bool> {
    uv_rawset(ud, uv, pointer_key(p), value)
}

/// `ud[uv][key]`, honoring `__index`.
pub fn uv_get(ud: &LuaAnyUserData, uv: usize, key: impl IntoLua) -> Result<LuaValue> {
    match slot(ud, uv)? {
        Some(table) => Ok(table.get(key)?),
        None => Ok(LuaValue::Nil),
    }
}

/// `ud[uv][key] = value`, honoring `__newindex`.
pub fn uv_set(ud: &LuaAnyUserData, uv: usize, key: impl IntoLua, value: impl IntoLua) -> Result<bool> {
    match slot(ud, uv)? {
        Some(table) => {
            table.set(key, value)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// `ud[uv][p]` where `p` is used as a light userdata key, honoring `__index`.
pub fn uv_getp(ud: &LuaAnyUserData, uv: usize, p: *const c_void) -> Result<LuaValue> {
    uv_get(ud, uv, pointer_key(p))
}

/// `ud[uv][p] = value` where `p` is used as a light userdata key, honoring `__newindex`.
pub fn uv_setp(ud: &LuaAnyUserData, uv: usize, p: *const c_void, value: impl IntoLua) -> Result<bool> {
    uv_set(ud, uv, pointer_key(p), value)
}

/// `ud[uv].k`, honoring `__index`.
pub fn uv_getfield(ud: &LuaAnyUserData, uv: usize, k: &str) -> Result<LuaValue> {
    uv_get(ud, uv, k)
}

/// `ud[uv].k = value`, honoring `__newindex`.
pub fn uv_setfield(ud: &LuaAnyUserData, uv: usize, k: &str, value: impl IntoLua) -> Result<bool> {
    uv_set(ud, uv, k, value)
}

/// Type name of `ud[uv][key]` ("nil" when the slot is not a table).
pub fn uv_type(ud: &LuaAnyUserData, uv: usize, key: impl IntoLua) -> Result<&'static str> {
    Ok(uv_get(ud, uv, key)?.type_name())
}
