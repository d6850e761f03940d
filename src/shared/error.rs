// Copyright 2026 Jordan Castro <jordan@grupojvm.com>
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with the License. You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the License for the specific language governing permissions and limitations under the License.
//
//! Error types for the class layer.

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, ClassError>;

/// Everything that can go wrong while registering, constructing or dispatching.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClassError {
    /// No class is registered under this name
    #[error("class '{0}' is not registered")]
    MissingClass(String),

    /// A class value without a `__name`
    #[error("class has no name")]
    MissingName,

    /// The declared parent can not be found
    #[error("class '{class}' declares parent '{parent}' which is not registered")]
    UnresolvedParent {
        /// Class being registered
        class: String,
        /// Parent it asked for
        parent: String,
    },

    /// The parent chain loops back on itself
    #[error("parent chain of class '{0}' forms a cycle")]
    Cycle(String),

    /// The value is not something that can be registered as a class
    #[error("expected a class, got {0}")]
    NotAClass(String),

    /// Argument type check failed
    #[error("bad argument #{arg} ({expected} expected, got {got})")]
    BadArgument {
        /// 1-based argument index
        arg: usize,
        /// Expected class name
        expected: String,
        /// Type or class actually received
        got: String,
    },

    /// The instance has no opaque block of the requested type
    #[error("object of class '{0}' carries no native data of the requested type")]
    NotNative(String),

    /// A class was constructed by calling it while construction by call is disabled
    #[error("class '{0}' cannot be constructed by calling it")]
    NotCallable(String),

    /// Error raised by the interpreter
    #[error(transparent)]
    Lua(#[from] mlua::Error),
}

impl From<ClassError> for mlua::Error {
    fn from(err: ClassError) -> Self {
        match err {
            ClassError::Lua(err) => err,
            other => mlua::Error::RuntimeError(other.to_string()),
        }
    }
}
