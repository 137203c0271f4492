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

use std::hash::{Hash, Hasher};

use uuid::Uuid;

use super::ClassicAddress;

/// Well-known Serial Port Profile service class UUID, used for RFCOMM
/// connections.
pub const SERIAL_PORT_PROFILE: Uuid =
    Uuid::from_u128(0x0000_1101_0000_1000_8000_0080_5f9b_34fb);

/// A discovered or bonded Bluetooth Classic endpoint.
#[derive(Clone, Debug)]
pub struct Device {
    address: ClassicAddress,
    name: Option<String>,
}

impl Device {
    pub fn new(address: ClassicAddress, name: Option<String>) -> Self {
        Device { address, name }
    }

    /// Shorthand for a device that advertised a name.
    pub fn named(address: ClassicAddress, name: impl Into<String>) -> Self {
        Device::new(address, Some(name.into()))
    }

    /// Retrieve this device's Bluetooth address.
    pub fn address(&self) -> ClassicAddress {
        self.address
    }

    /// Retrieve the name advertised by this device, if the platform exposed
    /// one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl PartialEq for Device {
    // Ignore the name. Two records describe the same device if their
    // addresses match.
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Device {}

impl Hash for Device {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}
