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

use uuid::Uuid;

use crate::{api::CapabilityProfile, common::SERIAL_PORT_PROFILE};

/// Per-session settings.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    capability_profile: CapabilityProfile,
    service_uuid: Uuid,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            capability_profile: CapabilityProfile::default(),
            service_uuid: SERIAL_PORT_PROFILE,
        }
    }
}

impl SessionConfig {
    /// Settings matching a host platform at `api_level`.
    pub fn for_api_level(api_level: u32) -> Self {
        SessionConfig::default()
            .with_capability_profile(CapabilityProfile::for_api_level(api_level))
    }

    pub fn with_capability_profile(mut self, profile: CapabilityProfile) -> Self {
        self.capability_profile = profile;
        self
    }

    /// Service the session connects to. Defaults to the Serial Port Profile.
    pub fn with_service_uuid(mut self, service_uuid: Uuid) -> Self {
        self.service_uuid = service_uuid;
        self
    }

    pub fn capability_profile(&self) -> CapabilityProfile {
        self.capability_profile
    }

    pub fn service_uuid(&self) -> Uuid {
        self.service_uuid
    }
}
