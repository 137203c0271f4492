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

/// Runtime capabilities a platform may gate Bluetooth operations behind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Single broad Bluetooth capability of older platform versions.
    Bluetooth,
    BluetoothScan,
    BluetoothConnect,
    /// Location access, which older platforms require before they report
    /// inquiry results.
    FineLocation,
}

/// Which capability set the host platform uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CapabilityProfile {
    /// One broad Bluetooth capability.
    Legacy,
    /// Separate scan and connect capabilities.
    #[default]
    Split,
}

impl CapabilityProfile {
    /// First platform API level that splits scan and connect capabilities.
    pub const SPLIT_API_LEVEL: u32 = 31;

    pub fn for_api_level(api_level: u32) -> Self {
        if api_level >= Self::SPLIT_API_LEVEL {
            CapabilityProfile::Split
        } else {
            CapabilityProfile::Legacy
        }
    }

    /// Capabilities that must all be granted before the session talks to the
    /// adapter.
    pub fn required(&self) -> &'static [Capability] {
        match self {
            CapabilityProfile::Legacy => &[Capability::Bluetooth],
            CapabilityProfile::Split => {
                &[Capability::BluetoothScan, Capability::BluetoothConnect]
            }
        }
    }

    /// Capabilities a UI should ask the user for before scanning. A superset
    /// of `required()`.
    pub fn requested(&self) -> &'static [Capability] {
        match self {
            CapabilityProfile::Legacy => {
                &[Capability::Bluetooth, Capability::FineLocation]
            }
            CapabilityProfile::Split => self.required(),
        }
    }
}

/// Grants or denies capability sets.
pub trait PermissionAuthority: Send + Sync {
    /// Returns true only if every capability in `set` is granted.
    fn has_capability(&self, set: &[Capability]) -> bool;
}

impl<F> PermissionAuthority for F
where
    F: Fn(&[Capability]) -> bool + Send + Sync,
{
    fn has_capability(&self, set: &[Capability]) -> bool {
        self(set)
    }
}
