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
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use tracing::{debug, info, warn};

use crate::{
    api::{
        AdapterEvent, AdapterHandle, DiscoveryListener, DiscoverySubscriber,
        PermissionAuthority, SubscriptionId,
    },
    common::{ClassicAddress, Device, SessionError},
    config::SessionConfig,
};

/// Lifecycle of a `DiscoverySession`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Scanning,
    /// The last scan ended. `start()` may be called again.
    Stopped,
}

/// Coarse adapter readiness, checked in the same order `start()` checks it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdapterStatus {
    Unavailable,
    Disabled,
    Ready,
}

struct ScanState {
    state: SessionState,
    discovered: Vec<Device>,
    seen: HashSet<ClassicAddress>,
    subscriber: Option<Arc<dyn DiscoverySubscriber>>,
    subscription: Option<SubscriptionId>,
    // Bumped on every `start()`, so events from an older subscription can be
    // told apart from the current one.
    generation: u64,
}

struct Shared<A, P> {
    adapter: A,
    authority: P,
    config: SessionConfig,
    scan: Mutex<ScanState>,
}

/// Listener registered with the adapter for one scan.
struct SessionListener<A, P> {
    shared: Weak<Shared<A, P>>,
    generation: u64,
}

/// Drives one Bluetooth Classic discovery cycle at a time against an
/// injected adapter, de-duplicating results by address.
///
/// Adapter events may arrive on any thread. Session state is only touched
/// under its lock, and the lock is never held while calling into the adapter
/// or the subscriber, so a subscriber may call back into the session.
pub struct DiscoverySession<A, P>
where
    A: AdapterHandle + 'static,
    P: PermissionAuthority + 'static,
{
    shared: Arc<Shared<A, P>>,
}

impl<A, P> DiscoverySession<A, P>
where
    A: AdapterHandle + 'static,
    P: PermissionAuthority + 'static,
{
    pub fn new(adapter: A, authority: P) -> Self {
        Self::with_config(adapter, authority, SessionConfig::default())
    }

    pub fn with_config(adapter: A, authority: P, config: SessionConfig) -> Self {
        let scan = ScanState {
            state: SessionState::Idle,
            discovered: Vec::new(),
            seen: HashSet::new(),
            subscriber: None,
            subscription: None,
            generation: 0,
        };

        DiscoverySession {
            shared: Arc::new(Shared {
                adapter,
                authority,
                config,
                scan: Mutex::new(scan),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    /// Devices found by the current or last scan, in discovery order.
    pub fn discovered(&self) -> Vec<Device> {
        self.shared.lock().discovered.clone()
    }

    pub fn is_available(&self) -> bool {
        self.shared.adapter.is_present()
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.adapter.is_present() && self.shared.adapter.is_enabled()
    }

    pub fn adapter_status(&self) -> AdapterStatus {
        if !self.shared.adapter.is_present() {
            AdapterStatus::Unavailable
        } else if !self.shared.adapter.is_enabled() {
            AdapterStatus::Disabled
        } else {
            AdapterStatus::Ready
        }
    }

    /// Start a new scan, reporting results to `subscriber`.
    ///
    /// Clears the devices of any earlier scan. Calling this while a scan is
    /// running restarts it with the new subscriber.
    pub fn start(
        &self,
        subscriber: impl DiscoverySubscriber + 'static,
    ) -> Result<(), SessionError> {
        let shared = &self.shared;
        match self.adapter_status() {
            AdapterStatus::Unavailable => return Err(SessionError::AdapterUnavailable),
            AdapterStatus::Disabled => return Err(SessionError::AdapterDisabled),
            AdapterStatus::Ready => (),
        }
        if !shared.is_granted() {
            return Err(SessionError::PermissionDenied);
        }

        let (generation, previous) = {
            let mut scan = shared.lock();
            if scan.state == SessionState::Scanning {
                debug!("Restarting discovery, dropping {} devices", scan.discovered.len());
            }
            scan.generation += 1;
            scan.discovered.clear();
            scan.seen.clear();
            scan.subscriber = Some(Arc::new(subscriber));
            scan.state = SessionState::Scanning;
            (scan.generation, scan.subscription.take())
        };
        if let Some(id) = previous {
            shared.adapter.unsubscribe(id);
        }

        let listener = Arc::new(SessionListener {
            shared: Arc::downgrade(shared),
            generation,
        });
        let id = match shared.adapter.subscribe(listener) {
            Ok(id) => id,
            Err(err) => {
                shared.abort_start(generation);
                return Err(SessionError::Adapter(err));
            }
        };

        {
            let mut scan = shared.lock();
            if scan.generation != generation || scan.state != SessionState::Scanning {
                // The scan ended before the subscription was recorded.
                drop(scan);
                shared.adapter.unsubscribe(id);
                return Ok(());
            }
            scan.subscription = Some(id);
        }

        if let Err(err) = shared.adapter.start_discovery() {
            shared.abort_start(generation);
            return Err(SessionError::Adapter(err));
        }

        // A stop or finished event may have landed while the adapter was
        // starting. Its cancel ran before the inquiry began, so cancel again.
        if shared.lock().state != SessionState::Scanning {
            debug!("Discovery stopped while starting, cancelling inquiry");
            if shared.is_granted() {
                if let Err(err) = shared.adapter.cancel_discovery() {
                    warn!("Failed to cancel discovery: {}", err);
                }
            }
            return Ok(());
        }

        info!("Discovery started");
        Ok(())
    }

    /// Stop the current scan. Safe to call at any time; a session that is
    /// not scanning keeps its state.
    pub fn stop(&self) {
        self.shared.stop(None);
    }

    /// Devices bonded with the adapter, or nothing if permission is missing.
    pub fn paired_devices(&self) -> Vec<Device> {
        let shared = &self.shared;
        if !shared.is_granted() {
            debug!("Permission missing, reporting no paired devices");
            return Vec::new();
        }
        if !shared.adapter.is_present() {
            return Vec::new();
        }

        match shared.adapter.bonded_devices() {
            Ok(devices) => devices,
            Err(err) => {
                warn!("Failed to list bonded devices: {}", err);
                Vec::new()
            }
        }
    }

    /// Name to show for `device`: its advertised name when permission allows
    /// reading it, its address otherwise.
    pub fn resolve_display_name(&self, device: &Device) -> String {
        if self.shared.is_granted() {
            if let Some(name) = device.name() {
                return name.to_string();
            }
        }
        device.address().to_string()
    }

    /// Open a channel to `device` on the configured service, cancelling
    /// discovery first. Discovery and connection can't run concurrently on
    /// most stacks.
    pub async fn connect(&self, device: &Device) -> Result<A::Channel, SessionError> {
        let shared = &self.shared;
        if !shared.is_granted() {
            return Err(SessionError::PermissionDenied);
        }

        if self.state() == SessionState::Scanning {
            self.stop();
        } else if let Err(err) = shared.adapter.cancel_discovery() {
            debug!("Cancel before connect failed: {}", err);
        }

        shared
            .adapter
            .open_channel(device, shared.config.service_uuid())
            .await
            .map_err(SessionError::Connect)
    }

    /// Best-effort variant of `connect`. The opened channel is released
    /// again; only success is reported.
    pub async fn attempt_connect(&self, device: &Device) -> bool {
        match self.connect(device).await {
            Ok(_channel) => {
                info!("Connected to {}", device.address());
                true
            }
            Err(err) => {
                warn!("Failed to connect to {}: {}", device.address(), err);
                false
            }
        }
    }
}

impl<A, P> Drop for DiscoverySession<A, P>
where
    A: AdapterHandle + 'static,
    P: PermissionAuthority + 'static,
{
    fn drop(&mut self) {
        self.shared.stop(None);
    }
}

impl<A, P> Shared<A, P>
where
    A: AdapterHandle + 'static,
    P: PermissionAuthority + 'static,
{
    fn lock(&self) -> MutexGuard<'_, ScanState> {
        self.scan.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_granted(&self) -> bool {
        self.authority
            .has_capability(self.config.capability_profile().required())
    }

    /// Shared by `stop()` and the adapter's finished event. `generation` is
    /// set for adapter-driven stops so a late event can't end a newer scan.
    fn stop(&self, generation: Option<u64>) {
        let (was_scanning, subscription, subscriber) = {
            let mut scan = self.lock();
            if let Some(generation) = generation {
                if generation != scan.generation {
                    debug!("Ignoring finished event of an old scan");
                    return;
                }
            }
            let was_scanning = scan.state == SessionState::Scanning;
            if was_scanning {
                scan.state = SessionState::Stopped;
            }
            (was_scanning, scan.subscription.take(), scan.subscriber.take())
        };

        if was_scanning && self.is_granted() {
            if let Err(err) = self.adapter.cancel_discovery() {
                warn!("Failed to cancel discovery: {}", err);
            }
        }
        if let Some(id) = subscription {
            self.adapter.unsubscribe(id);
        }
        drop(subscriber);

        if was_scanning {
            info!("Discovery stopped");
        }
    }

    /// Roll back a `start()` the adapter refused.
    fn abort_start(&self, generation: u64) {
        let subscription = {
            let mut scan = self.lock();
            if scan.generation != generation {
                return;
            }
            scan.state = SessionState::Stopped;
            scan.subscriber = None;
            scan.subscription.take()
        };
        if let Some(id) = subscription {
            self.adapter.unsubscribe(id);
        }
    }

    fn on_device_found(&self, generation: u64, device: Device) {
        let (subscriber, snapshot) = {
            let mut scan = self.lock();
            if scan.generation != generation || scan.state != SessionState::Scanning {
                debug!("Ignoring {} found outside of a scan", device.address());
                return;
            }
            if !scan.seen.insert(device.address()) {
                return;
            }
            debug!("Found {}", device.address());
            scan.discovered.push(device);
            (scan.subscriber.clone(), scan.discovered.clone())
        };

        if let Some(subscriber) = subscriber {
            subscriber.on_devices_updated(snapshot);
        }
    }
}

impl<A, P> DiscoveryListener for SessionListener<A, P>
where
    A: AdapterHandle + 'static,
    P: PermissionAuthority + 'static,
{
    fn on_adapter_event(&self, event: AdapterEvent) {
        let shared = match self.shared.upgrade() {
            Some(shared) => shared,
            // Session already dropped.
            None => return,
        };

        match event {
            AdapterEvent::DeviceFound(device) => {
                shared.on_device_found(self.generation, device)
            }
            AdapterEvent::DiscoveryFinished => shared.stop(Some(self.generation)),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;
    use crate::{
        api::{Capability, CapabilityProfile},
        emulator::{EmulatedAdapter, EmulatedAuthority},
    };

    fn device(addr: u64, name: &str) -> Device {
        Device::named(ClassicAddress::from(addr), name)
    }

    fn granted_session(
        adapter: &EmulatedAdapter,
    ) -> (DiscoverySession<EmulatedAdapter, EmulatedAuthority>, EmulatedAuthority) {
        let authority = EmulatedAuthority::granting(CapabilityProfile::Split.required());
        let session = DiscoverySession::new(adapter.clone(), authority.clone());
        (session, authority)
    }

    /// Subscriber recording every snapshot it receives.
    fn recorder() -> (Arc<Mutex<Vec<Vec<Device>>>>, impl DiscoverySubscriber) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        (calls, move |devices: Vec<Device>| sink.lock().unwrap().push(devices))
    }

    #[test]
    fn duplicates_are_reported_once() {
        let adapter = EmulatedAdapter::builder().build();
        let (session, _authority) = granted_session(&adapter);
        let (calls, subscriber) = recorder();
        let (a, b, c) = (device(0xA, "a"), device(0xB, "b"), device(0xC, "c"));

        session.start(subscriber).unwrap();
        for d in [&a, &b, &a, &c] {
            adapter.emit_device_found(d.clone());
        }

        let calls = calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                vec![a.clone()],
                vec![a.clone(), b.clone()],
                vec![a.clone(), b.clone(), c.clone()],
            ]
        );
        assert_eq!(session.discovered(), vec![a, b, c]);
    }

    #[test]
    fn duplicate_with_new_name_keeps_first_record() {
        let adapter = EmulatedAdapter::builder().build();
        let (session, _authority) = granted_session(&adapter);
        let addr = ClassicAddress::from(0x7);

        session.start(|_: Vec<Device>| {}).unwrap();
        adapter.emit_device_found(Device::new(addr, None));
        adapter.emit_device_found(Device::named(addr, "Speaker"));

        let discovered = session.discovered();
        assert_eq!(discovered.len(), 1);
        assert_eq!(discovered[0].name(), None);
    }

    #[test]
    fn restart_clears_discovered() {
        let adapter = EmulatedAdapter::builder().build();
        let (session, _authority) = granted_session(&adapter);

        session.start(|_: Vec<Device>| {}).unwrap();
        adapter.emit_device_found(device(0x1, "one"));
        adapter.emit_device_found(device(0x2, "two"));

        let (calls, subscriber) = recorder();
        session.start(subscriber).unwrap();
        assert!(session.discovered().is_empty());
        assert_eq!(session.state(), SessionState::Scanning);

        adapter.emit_device_found(device(0x2, "two"));
        assert_eq!(*calls.lock().unwrap(), vec![vec![device(0x2, "two")]]);
        assert_eq!(adapter.listener_count(), 1);
        assert_eq!(adapter.start_count(), 2);
    }

    #[test]
    fn start_checks_preconditions_in_order() {
        let absent = EmulatedAdapter::builder().present(false).enabled(false).build();
        let session = DiscoverySession::new(absent.clone(), EmulatedAuthority::denying());
        assert_eq!(session.start(|_: Vec<Device>| {}), Err(SessionError::AdapterUnavailable));

        let disabled = EmulatedAdapter::builder().enabled(false).build();
        let session = DiscoverySession::new(disabled.clone(), EmulatedAuthority::denying());
        assert_eq!(session.start(|_: Vec<Device>| {}), Err(SessionError::AdapterDisabled));

        let ready = EmulatedAdapter::builder().build();
        let session = DiscoverySession::new(ready.clone(), EmulatedAuthority::denying());
        assert_eq!(session.start(|_: Vec<Device>| {}), Err(SessionError::PermissionDenied));

        for adapter in [absent, disabled, ready] {
            assert_eq!(adapter.start_count(), 0);
            assert_eq!(adapter.listener_count(), 0);
        }
    }

    #[test]
    fn failed_start_leaves_discovered_untouched() {
        let adapter = EmulatedAdapter::builder().build();
        let (session, _authority) = granted_session(&adapter);
        session.start(|_: Vec<Device>| {}).unwrap();
        adapter.emit_device_found(device(0x1, "one"));
        session.stop();

        adapter.set_enabled(false);
        assert_eq!(session.start(|_: Vec<Device>| {}), Err(SessionError::AdapterDisabled));
        assert_eq!(session.discovered(), vec![device(0x1, "one")]);
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn stop_when_idle_is_noop() {
        let adapter = EmulatedAdapter::builder().build();
        let (session, _authority) = granted_session(&adapter);

        session.stop();
        session.stop();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(adapter.cancel_count(), 0);
    }

    #[test]
    fn stop_cancels_and_unsubscribes() {
        let adapter = EmulatedAdapter::builder().build();
        let (session, _authority) = granted_session(&adapter);
        let (calls, subscriber) = recorder();

        session.start(subscriber).unwrap();
        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(adapter.cancel_count(), 1);
        assert_eq!(adapter.listener_count(), 0);

        adapter.emit_device_found(device(0x1, "late"));
        assert!(calls.lock().unwrap().is_empty());
        assert!(session.discovered().is_empty());

        session.stop();
        assert_eq!(adapter.cancel_count(), 1);
    }

    #[test]
    fn stop_without_permission_skips_cancel() {
        let adapter = EmulatedAdapter::builder().build();
        let (session, authority) = granted_session(&adapter);

        session.start(|_: Vec<Device>| {}).unwrap();
        authority.revoke(Capability::BluetoothScan);
        session.stop();

        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(adapter.cancel_count(), 0);
        assert_eq!(adapter.listener_count(), 0);
    }

    #[test]
    fn discovery_finished_matches_stop() {
        let adapter = EmulatedAdapter::builder().build();
        let (session, _authority) = granted_session(&adapter);
        let (calls, subscriber) = recorder();

        session.start(subscriber).unwrap();
        adapter.emit_device_found(device(0x1, "one"));
        adapter.finish_discovery();

        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(adapter.listener_count(), 0);

        adapter.emit_device_found(device(0x2, "two"));
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(session.discovered(), vec![device(0x1, "one")]);
    }

    #[test]
    fn subscriber_may_stop_the_session() {
        let adapter = EmulatedAdapter::builder().build();
        let (session, _authority) = granted_session(&adapter);
        let session = Arc::new(session);

        let weak = Arc::downgrade(&session);
        session
            .start(move |_: Vec<Device>| {
                if let Some(session) = weak.upgrade() {
                    session.stop();
                }
            })
            .unwrap();
        adapter.emit_device_found(device(0x1, "one"));

        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.discovered(), vec![device(0x1, "one")]);
    }

    #[test]
    fn paired_devices_require_permission() {
        let bonded = vec![device(0x3, "car"), device(0x1, "watch"), device(0x2, "buds")];
        let adapter = EmulatedAdapter::builder().bonded(bonded.clone()).build();
        let (session, authority) = granted_session(&adapter);

        let paired = session.paired_devices();
        assert_eq!(paired, bonded);
        let names: Vec<_> = paired.iter().map(|d| d.name().unwrap()).collect();
        assert_eq!(names, ["car", "watch", "buds"]);

        authority.revoke(Capability::BluetoothConnect);
        assert!(session.paired_devices().is_empty());
    }

    #[test]
    fn display_name_falls_back_to_address() {
        let adapter = EmulatedAdapter::builder().build();
        let (session, authority) = granted_session(&adapter);
        let named = device(0x00112233AABB, "Headset");
        let unnamed = Device::new(ClassicAddress::from(0x1), None);

        assert_eq!(session.resolve_display_name(&named), "Headset");
        assert_eq!(session.resolve_display_name(&unnamed), "00:00:00:00:00:01");

        authority.revoke(Capability::BluetoothScan);
        assert_eq!(session.resolve_display_name(&named), "00:11:22:33:AA:BB");
    }

    #[test]
    fn connect_cancels_scan_and_uses_serial_port_profile() {
        let adapter = EmulatedAdapter::builder().build();
        let (session, _authority) = granted_session(&adapter);
        let target = device(0x5, "printer");

        session.start(|_: Vec<Device>| {}).unwrap();
        assert!(block_on(session.attempt_connect(&target)));

        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(adapter.cancel_count(), 1);
        assert_eq!(
            adapter.opened_channels(),
            vec![(target.address(), crate::common::SERIAL_PORT_PROFILE)]
        );
    }

    #[test]
    fn connect_failures_collapse_to_false() {
        let target = device(0x5, "printer");
        let adapter = EmulatedAdapter::builder()
            .failing_connect(target.address())
            .build();
        let (session, authority) = granted_session(&adapter);

        assert_eq!(
            block_on(session.connect(&target)).err(),
            Some(SessionError::Connect(crate::common::BluetoothError::ConnectionFailed(
                format!("{} refused the connection", target.address())
            )))
        );
        assert!(!block_on(session.attempt_connect(&target)));

        authority.revoke(Capability::BluetoothConnect);
        let cancels = adapter.cancel_count();
        assert_eq!(
            block_on(session.connect(&target)).err(),
            Some(SessionError::PermissionDenied)
        );
        assert_eq!(adapter.cancel_count(), cancels);
        assert!(adapter.opened_channels().is_empty());
    }

    #[test]
    fn legacy_profile_checks_broad_capability() {
        let adapter = EmulatedAdapter::builder().build();
        let authority = EmulatedAuthority::granting(&[Capability::Bluetooth]);
        let session = DiscoverySession::with_config(
            adapter.clone(),
            authority,
            SessionConfig::for_api_level(29),
        );

        assert!(session.start(|_: Vec<Device>| {}).is_ok());
        assert_eq!(session.state(), SessionState::Scanning);
    }

    #[test]
    fn drop_stops_scan() {
        let adapter = EmulatedAdapter::builder().build();
        let (session, _authority) = granted_session(&adapter);

        session.start(|_: Vec<Device>| {}).unwrap();
        drop(session);

        assert_eq!(adapter.cancel_count(), 1);
        assert_eq!(adapter.listener_count(), 0);
    }
}
