// Copyright 2026 Jordan Castro <jordan@grupojvm.com>
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the License for the specific language governing permissions and limitations under the License.
//
use std::any::Any;

use mlua::{Lua, MultiValue, UserData};

/// Allocates the opaque block of a native instance.
///
/// Runs once per instance, for the nearest class in the chain that has one.
/// The crate wraps the returned block in a userdata and gives it a fields table.
pub type Allocator = fn(lua: &Lua) -> mlua::Result<Box<dyn Any>>;

/// Cleans up the opaque block of a native instance.
///
/// Do not free the block itself, the collector owns it. Runs during
/// finalization so it must not call back into Lua.
pub type Destructor = fn(data: &mut dyn Any);

/// A native method. The receiver is the first value of `args`.
pub type Method = fn(lua: &Lua, args: MultiValue) -> mlua::Result<MultiValue>;

/// Describes a native class.
///
/// This is the host side shape of a class. Registering it creates the class
/// table in Lua and keeps the descriptor alive inside it.
///
/// example:
/// ```no_run
/// # use luaclass::shared::class::ClassDesc;
/// # fn foo(_: &mlua::Lua, args: mlua::MultiValue) -> mlua::Result<mlua::MultiValue> { Ok(args) }
/// let desc = ClassDesc::new("Point")
///     .with_parent("Shape")
///     .with_method("foo", foo);
/// ```
#[derive(Clone)]
pub struct ClassDesc {
    /// The name of the class.
    pub name: String,
    /// The name of the parent.
    pub parent: Option<String>,
    /// Whether calling the class object from Lua constructs an instance.
    pub user_ctor: bool,
    /// The class allocator.
    pub alloc: Option<Allocator>,
    /// The class destructor.
    pub gc: Option<Destructor>,
    /// The class methods, merged into the class table on registration.
    pub methods: Vec<(String, Method)>,
}

impl ClassDesc {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parent: None,
            user_ctor: true,
            alloc: None,
            gc: None,
            methods: vec![],
        }
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    pub fn with_user_ctor(mut self, user_ctor: bool) -> Self {
        self.user_ctor = user_ctor;
        self
    }

    pub fn with_alloc(mut self, alloc: Allocator) -> Self {
        self.alloc = Some(alloc);
        self
    }

    pub fn with_gc(mut self, gc: Destructor) -> Self {
        self.gc = Some(gc);
        self
    }

    pub fn with_method(mut self, name: &str, method: Method) -> Self {
        self.methods.push((name.to_string(), method));
        self
    }

    /// Is this a native class (one with an allocator)?
    pub fn is_native(&self) -> bool {
        self.alloc.is_some()
    }
}

impl std::fmt::Debug for ClassDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassDesc")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("user_ctor", &self.user_ctor)
            .field("alloc", &self.alloc.is_some())
            .field("gc", &self.gc.is_some())
            .field("methods", &self.methods.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

// Lives in Lua as the `__uclass` field of a registered class table.
impl UserData for ClassDesc {}
