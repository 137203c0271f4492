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

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    api::{self, DiscoveryListener, SubscriptionId},
    common::{BluetoothError, Device},
};

fn unsupported() -> BluetoothError {
    BluetoothError::NotSupported(String::from("no bluetooth backend for this target platform"))
}

/// Concrete type implementing `api::AdapterHandle` for unsupported platforms.
/// Reports no adapter, so sessions fail their preconditions instead of
/// reaching the other methods.
pub struct AdapterHandle;

/// Never constructed; `open_channel` always fails.
pub enum Channel {}

#[async_trait]
impl api::AdapterHandle for AdapterHandle {
    type Channel = Channel;

    fn is_present(&self) -> bool {
        false
    }

    fn is_enabled(&self) -> bool {
        false
    }

    fn start_discovery(&self) -> Result<(), BluetoothError> {
        Err(unsupported())
    }

    fn cancel_discovery(&self) -> Result<(), BluetoothError> {
        Err(unsupported())
    }

    fn bonded_devices(&self) -> Result<Vec<Device>, BluetoothError> {
        Err(unsupported())
    }

    async fn open_channel(
        &self,
        _device: &Device,
        _service: Uuid,
    ) -> Result<Channel, BluetoothError> {
        Err(unsupported())
    }

    fn subscribe(
        &self,
        _listener: Arc<dyn DiscoveryListener>,
    ) -> Result<SubscriptionId, BluetoothError> {
        Err(unsupported())
    }

    fn unsubscribe(&self, _id: SubscriptionId) {}
}
