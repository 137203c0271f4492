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

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::common::Device;

/// Receives the accumulated device list of a scan. Called once per newly
/// discovered address with every device seen so far, in discovery order.
///
/// Calls come from whatever thread the adapter delivers events on. Use
/// `channel_subscriber` to consume updates from another execution context.
pub trait DiscoverySubscriber: Send + Sync {
    fn on_devices_updated(&self, devices: Vec<Device>);
}

impl<F> DiscoverySubscriber for F
where
    F: Fn(Vec<Device>) + Send + Sync,
{
    fn on_devices_updated(&self, devices: Vec<Device>) {
        self(devices)
    }
}

/// Subscriber that forwards each snapshot into a channel.
pub struct ChannelSubscriber {
    sender: UnboundedSender<Vec<Device>>,
}

/// Create a subscriber paired with a `Stream` of its snapshots. The stream
/// ends once the session drops the subscriber, i.e. when the scan stops.
pub fn channel_subscriber() -> (ChannelSubscriber, UnboundedReceiver<Vec<Device>>) {
    let (sender, receiver) = mpsc::unbounded();
    (ChannelSubscriber { sender }, receiver)
}

impl DiscoverySubscriber for ChannelSubscriber {
    fn on_devices_updated(&self, devices: Vec<Device>) {
        if let Err(err) = self.sender.unbounded_send(devices) {
            // Receiver is gone; nobody is listening anymore.
            debug!("Dropping device snapshot: {}", err);
        }
    }
}
