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

use crate::common::{BluetoothError, Device};

/// Handle returned by `AdapterHandle::subscribe`, used to drop the
/// subscription again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn new(id: u64) -> Self {
        SubscriptionId(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Discovery events raised by the platform stack.
#[derive(Clone, Debug, PartialEq)]
pub enum AdapterEvent {
    /// A device answered the inquiry. May repeat for the same address.
    DeviceFound(Device),
    /// The platform ended the inquiry, either on its own or because it was
    /// cancelled.
    DiscoveryFinished,
}

/// Receives `AdapterEvent`s. Implementations must tolerate being called from
/// any thread, including concurrently.
pub trait DiscoveryListener: Send + Sync {
    fn on_adapter_event(&self, event: AdapterEvent);
}

/// Concrete types implementing this trait wrap the platform's Bluetooth
/// Classic adapter. They provide capability-gated control over device
/// discovery, the bonded-device list, and channel creation.
///
/// None of the methods block on the radio. `start_discovery` returns once the
/// inquiry is scheduled; results arrive later through subscribed listeners.
#[async_trait]
pub trait AdapterHandle: Send + Sync {
    /// Platform connection type produced by `open_channel`.
    type Channel: Send;

    /// Whether the host has a Bluetooth adapter at all.
    fn is_present(&self) -> bool;

    /// Whether the adapter is powered on.
    fn is_enabled(&self) -> bool;

    /// Begin an inquiry for nearby devices.
    fn start_discovery(&self) -> Result<(), BluetoothError>;

    /// Cancel a running inquiry.
    fn cancel_discovery(&self) -> Result<(), BluetoothError>;

    /// Devices bonded with this adapter, in platform order.
    fn bonded_devices(&self) -> Result<Vec<Device>, BluetoothError>;

    /// Open an RFCOMM channel to `device` for the service identified by
    /// `service`.
    async fn open_channel(
        &self,
        device: &Device,
        service: Uuid,
    ) -> Result<Self::Channel, BluetoothError>;

    /// Register `listener` for `DeviceFound` and `DiscoveryFinished` events.
    fn subscribe(
        &self,
        listener: Arc<dyn DiscoveryListener>,
    ) -> Result<SubscriptionId, BluetoothError>;

    /// Drop a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}
