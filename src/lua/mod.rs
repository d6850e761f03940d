// Copyright 2026 Jordan Castro <jordan@grupojvm.com>
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the License for the specific language governing permissions and limitations under the License.
//
//! The mlua binding of the class layer.

pub mod class;
pub mod func;
pub mod module;
pub mod object;
pub mod uservalue;

use std::ffi::c_void;

use mlua::prelude::*;
use tracing::warn;

/// Registry name of the class registry table.
pub const REGISTRY_KEY: &str = "luaclass.registry";

/// Metafield holding the class name.
pub const NAME: &str = "__name";
/// Metafield holding the class table.
pub const CLASS: &str = "__class";
/// Raw field of a class table pointing at its parent class table.
pub const PARENT: &str = "__parent";
/// Raw field of a class table holding its native descriptor.
pub const UCLASS: &str = "__uclass";
/// Raw field of a scripted class controlling construction by call.
pub const USER_CTOR: &str = "__user_ctor";
/// Initializer method name.
pub const INIT: &str = "__init";
pub const INDEX: &str = "__index";
pub const NEWINDEX: &str = "__newindex";
pub const CALL: &str = "__call";

/// User-value slot of a native instance that holds its fields table.
pub const FIELDS_SLOT: usize = 1;

/// A super call in flight.
struct SuperFrame {
    /// Identity of the receiver.
    receiver: *const c_void,
    /// Method being dispatched.
    method: String,
    /// Class whose method is running.
    class: LuaTable,
    /// The method function that was called.
    function: LuaFunction,
}

/// Per-interpreter dispatch state, kept in the interpreter's app data.
#[derive(Default)]
struct State {
    /// Super dispatches currently on the call stack, innermost last.
    frames: Vec<SuperFrame>,
}

/// Run `f` against this interpreter's state, creating it on first use.
///
/// Never call back into Lua from `f`: the state is borrowed for its duration.
fn with_state<R>(lua: &Lua, f: impl FnOnce(&mut State) -> R) -> R {
    if lua.app_data_ref::<State>().is_none() {
        lua.set_app_data(State::default());
    }
    match lua.app_data_mut::<State>() {
        Some(mut state) => f(&mut state),
        None => {
            // Frames recorded here are lost: super falls back to method owners.
            warn!("super dispatch state unavailable, using a detached one");
            f(&mut State::default())
        }
    }
}
