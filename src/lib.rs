// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub mod api;
mod common;
mod config;
pub mod emulator;
mod session;
mod unsupported;

pub use common::{
    BluetoothError, ClassicAddress, Device, SessionError, SERIAL_PORT_PROFILE,
};
pub use config::SessionConfig;
pub use session::{AdapterStatus, DiscoverySession, SessionState};

use unsupported as platform;

pub struct Platform;

impl Platform {
    /// Adapter of the host platform. Targets without a Bluetooth backend get
    /// an adapter that reports itself absent.
    pub fn default_adapter() -> impl api::AdapterHandle {
        platform::AdapterHandle
    }
}
