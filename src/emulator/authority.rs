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

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::debug;

use crate::api::{Capability, PermissionAuthority};

/// Permission authority whose grants can be changed at runtime, standing in
/// for a user answering permission prompts. Clones share their grants.
#[derive(Clone, Default)]
pub struct EmulatedAuthority {
    granted: Arc<Mutex<HashSet<Capability>>>,
}

impl EmulatedAuthority {
    pub fn granting(capabilities: &[Capability]) -> Self {
        let authority = EmulatedAuthority::default();
        for capability in capabilities {
            authority.grant(*capability);
        }
        authority
    }

    pub fn denying() -> Self {
        EmulatedAuthority::default()
    }

    pub fn grant(&self, capability: Capability) {
        debug!("Granting {:?}", capability);
        self.lock().insert(capability);
    }

    pub fn revoke(&self, capability: Capability) {
        debug!("Revoking {:?}", capability);
        self.lock().remove(&capability);
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<Capability>> {
        self.granted.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PermissionAuthority for EmulatedAuthority {
    fn has_capability(&self, set: &[Capability]) -> bool {
        let granted = self.lock();
        set.iter().all(|capability| granted.contains(capability))
    }
}
