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
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread,
    time::Duration,
};

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    api::{AdapterEvent, AdapterHandle, DiscoveryListener, SubscriptionId},
    common::{BluetoothError, ClassicAddress, Device},
};

/// In-process adapter. Devices are either pushed by hand through
/// `emit_device_found` or replayed from a script on a background thread once
/// discovery starts.
#[derive(Clone)]
pub struct EmulatedAdapter {
    inner: Arc<Inner>,
}

/// Connection handed out by `EmulatedAdapter::open_channel`.
#[derive(Debug)]
pub struct EmulatedChannel {
    device: Device,
    service: Uuid,
}

impl EmulatedChannel {
    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn service(&self) -> Uuid {
        self.service
    }
}

#[derive(Default)]
pub struct EmulatedAdapterBuilder {
    absent: bool,
    disabled: bool,
    bonded: Vec<Device>,
    script: Vec<Device>,
    interval: Duration,
    failing: HashSet<ClassicAddress>,
}

struct Inner {
    present: bool,
    enabled: AtomicBool,
    bonded: Vec<Device>,
    script: Vec<Device>,
    interval: Duration,
    failing: HashSet<ClassicAddress>,
    state: Mutex<EmulatorState>,
}

#[derive(Default)]
struct EmulatorState {
    listeners: Vec<(SubscriptionId, Arc<dyn DiscoveryListener>)>,
    next_id: u64,
    discovering: bool,
    // Identifies the current inquiry so a replay thread notices restarts.
    run: u64,
    start_count: usize,
    cancel_count: usize,
    opened: Vec<(ClassicAddress, Uuid)>,
}

impl EmulatedAdapterBuilder {
    pub fn present(mut self, present: bool) -> Self {
        self.absent = !present;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.disabled = !enabled;
        self
    }

    pub fn bonded(mut self, devices: Vec<Device>) -> Self {
        self.bonded = devices;
        self
    }

    /// Devices reported, one per `interval`, after each `start_discovery`.
    /// The inquiry finishes on its own after the last one.
    pub fn script(mut self, devices: Vec<Device>, interval: Duration) -> Self {
        self.script = devices;
        self.interval = interval;
        self
    }

    /// Make `open_channel` fail for `address`.
    pub fn failing_connect(mut self, address: ClassicAddress) -> Self {
        self.failing.insert(address);
        self
    }

    pub fn build(self) -> EmulatedAdapter {
        EmulatedAdapter {
            inner: Arc::new(Inner {
                present: !self.absent,
                enabled: AtomicBool::new(!self.disabled),
                bonded: self.bonded,
                script: self.script,
                interval: self.interval,
                failing: self.failing,
                state: Mutex::new(EmulatorState::default()),
            }),
        }
    }
}

impl EmulatedAdapter {
    pub fn builder() -> EmulatedAdapterBuilder {
        EmulatedAdapterBuilder::default()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Report `device` to every current listener from the calling thread.
    pub fn emit_device_found(&self, device: Device) {
        self.inner.emit(AdapterEvent::DeviceFound(device));
    }

    /// End the inquiry the way the platform does when it times out.
    pub fn finish_discovery(&self) {
        self.inner.lock().discovering = false;
        self.inner.emit(AdapterEvent::DiscoveryFinished);
    }

    pub fn is_discovering(&self) -> bool {
        self.inner.lock().discovering
    }

    pub fn start_count(&self) -> usize {
        self.inner.lock().start_count
    }

    pub fn cancel_count(&self) -> usize {
        self.inner.lock().cancel_count
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    /// Every channel opened so far, as (device address, service uuid).
    pub fn opened_channels(&self) -> Vec<(ClassicAddress, Uuid)> {
        self.inner.lock().opened.clone()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, EmulatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: AdapterEvent) {
        // Listeners may call back into the adapter, so they run unlocked.
        let listeners: Vec<_> = self
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener.on_adapter_event(event.clone());
        }
    }

    fn is_running(&self, run: u64) -> bool {
        let state = self.lock();
        state.discovering && state.run == run
    }

    fn replay(self: Arc<Self>, run: u64) {
        for device in self.script.iter() {
            thread::sleep(self.interval);
            if !self.is_running(run) {
                debug!("Emulated inquiry {} was cancelled", run);
                return;
            }
            self.emit(AdapterEvent::DeviceFound(device.clone()));
        }

        let finished = {
            let mut state = self.lock();
            if state.discovering && state.run == run {
                state.discovering = false;
                true
            } else {
                false
            }
        };
        if finished {
            info!("Emulated inquiry {} finished", run);
            self.emit(AdapterEvent::DiscoveryFinished);
        }
    }
}

#[async_trait]
impl AdapterHandle for EmulatedAdapter {
    type Channel = EmulatedChannel;

    fn is_present(&self) -> bool {
        self.inner.present
    }

    fn is_enabled(&self) -> bool {
        self.inner.present && self.inner.enabled.load(Ordering::SeqCst)
    }

    fn start_discovery(&self) -> Result<(), BluetoothError> {
        if !self.is_enabled() {
            return Err(BluetoothError::FailedPrecondition(String::from(
                "adapter is not enabled",
            )));
        }

        let run = {
            let mut state = self.inner.lock();
            state.discovering = true;
            state.run += 1;
            state.start_count += 1;
            state.run
        };
        info!("Emulated adapter starts inquiry {}", run);

        if !self.inner.script.is_empty() {
            let inner = self.inner.clone();
            thread::spawn(move || inner.replay(run));
        }
        Ok(())
    }

    fn cancel_discovery(&self) -> Result<(), BluetoothError> {
        let was_discovering = {
            let mut state = self.inner.lock();
            state.cancel_count += 1;
            std::mem::replace(&mut state.discovering, false)
        };
        if was_discovering {
            self.inner.emit(AdapterEvent::DiscoveryFinished);
        }
        Ok(())
    }

    fn bonded_devices(&self) -> Result<Vec<Device>, BluetoothError> {
        if !self.inner.present {
            return Err(BluetoothError::NotSupported(String::from(
                "no bluetooth adapter",
            )));
        }
        Ok(self.inner.bonded.clone())
    }

    async fn open_channel(
        &self,
        device: &Device,
        service: Uuid,
    ) -> Result<EmulatedChannel, BluetoothError> {
        let address = device.address();
        if self.inner.failing.contains(&address) {
            return Err(BluetoothError::ConnectionFailed(format!(
                "{} refused the connection",
                address
            )));
        }

        self.inner.lock().opened.push((address, service));
        Ok(EmulatedChannel {
            device: device.clone(),
            service,
        })
    }

    fn subscribe(
        &self,
        listener: Arc<dyn DiscoveryListener>,
    ) -> Result<SubscriptionId, BluetoothError> {
        let mut state = self.inner.lock();
        state.next_id += 1;
        let id = SubscriptionId::new(state.next_id);
        state.listeners.push((id, listener));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.lock().listeners.retain(|(other, _)| *other != id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use futures::executor::block_on;

    use super::*;

    struct Forward(Mutex<mpsc::Sender<AdapterEvent>>);

    impl DiscoveryListener for Forward {
        fn on_adapter_event(&self, event: AdapterEvent) {
            let _ = self.0.lock().unwrap().send(event);
        }
    }

    fn forward() -> (Arc<dyn DiscoveryListener>, mpsc::Receiver<AdapterEvent>) {
        let (tx, rx) = mpsc::channel();
        (Arc::new(Forward(Mutex::new(tx))), rx)
    }

    #[test]
    fn script_replays_then_finishes() {
        let devices = vec![
            Device::named(ClassicAddress::from(0x1), "one"),
            Device::named(ClassicAddress::from(0x2), "two"),
        ];
        let adapter = EmulatedAdapter::builder()
            .script(devices.clone(), Duration::from_millis(1))
            .build();
        let (listener, rx) = forward();
        adapter.subscribe(listener).unwrap();

        adapter.start_discovery().unwrap();
        let events: Vec<_> = rx.iter().take(3).collect();
        assert_eq!(
            events,
            vec![
                AdapterEvent::DeviceFound(devices[0].clone()),
                AdapterEvent::DeviceFound(devices[1].clone()),
                AdapterEvent::DiscoveryFinished,
            ]
        );
        assert!(!adapter.is_discovering());
    }

    #[test]
    fn cancel_emits_finished_once() {
        let adapter = EmulatedAdapter::builder().build();
        let (listener, rx) = forward();
        adapter.subscribe(listener).unwrap();

        adapter.start_discovery().unwrap();
        adapter.cancel_discovery().unwrap();
        adapter.cancel_discovery().unwrap();

        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![AdapterEvent::DiscoveryFinished]);
        assert_eq!(adapter.cancel_count(), 2);
    }

    #[test]
    fn unsubscribed_listener_gets_nothing() {
        let adapter = EmulatedAdapter::builder().build();
        let (listener, rx) = forward();
        let id = adapter.subscribe(listener).unwrap();
        adapter.unsubscribe(id);

        adapter.emit_device_found(Device::new(ClassicAddress::from(0x1), None));
        assert!(rx.try_recv().is_err());
        assert_eq!(adapter.listener_count(), 0);
    }

    #[test]
    fn disabled_adapter_refuses_discovery() {
        let adapter = EmulatedAdapter::builder().enabled(false).build();
        assert!(matches!(
            adapter.start_discovery(),
            Err(BluetoothError::FailedPrecondition(_))
        ));
        assert_eq!(adapter.start_count(), 0);
    }

    #[test]
    fn open_channel_records_service() {
        let device = Device::named(ClassicAddress::from(0x9), "modem");
        let adapter = EmulatedAdapter::builder().build();
        let service = Uuid::from_u128(0x1234);

        let channel = block_on(adapter.open_channel(&device, service)).unwrap();
        assert_eq!(channel.device(), &device);
        assert_eq!(channel.service(), service);
        assert_eq!(adapter.opened_channels(), vec![(device.address(), service)]);
    }
}
