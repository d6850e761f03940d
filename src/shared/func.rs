// Copyright 2026 Jordan Castro <jordan@grupojvm.com>
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the License for the specific language governing permissions and limitations under the License.
//
use mlua::{Lua, MultiValue, Value};

/// Function reference used for injected methods.
///
/// lua: the interpreter.
/// prev: whatever sat at the method slot before the injection.
/// args: the arguments the method was called with.
///
/// Hand `prev` to `defer_index` / `defer_newindex` (or call it yourself) to
/// continue down the chain.
pub type Injected = fn(lua: &Lua, prev: &Previous, args: MultiValue) -> mlua::Result<MultiValue>;

/// The method an injection replaced. Captured by the injected closure, one per
/// injection, so nested injections each see their own predecessor.
#[derive(Clone, Debug)]
pub struct Previous(pub(crate) Value);

impl Previous {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The raw captured value (nil, a function, a table, ...).
    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Call the replaced method with `args`. A missing method returns nothing.
    pub fn call(&self, args: MultiValue) -> mlua::Result<MultiValue> {
        match &self.0 {
            Value::Function(function) => function.call(args),
            Value::Nil => Ok(MultiValue::new()),
            other => Err(mlua::Error::RuntimeError(format!(
                "previous method is a {} value and can not be called",
                other.type_name()
            ))),
        }
    }
}
