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

use thiserror::Error;

/// Errors reported by an `AdapterHandle` implementation.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq)]
pub enum BluetoothError {
    /// Reported when the user attempts a bad type conversion, e.g. parsing a
    /// malformed address string.
    #[error("bad type conversion: {0}")]
    BadTypeConversion(String),
    /// Indicates that the operation was rejected because the adapter is not in
    /// a state required for the operation's execution.
    /// E.g. cancelling discovery that was never started.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),
    /// Reported when the platform has no Bluetooth backend for this build.
    #[error("bluetooth operation not supported by system: {0}")]
    NotSupported(String),
    /// Reported when the platform stack could not open a channel to a device.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// Wrapper around OS-level errors. These typically mean something is very
    /// wrong with the system.
    #[error("bluetooth system-level error: {0}")]
    System(String),
    /// Reported when a bug occurs inside the library. Whenever a seemingly
    /// impossible error condition arises where you could call `expect()`,
    /// return this error instead.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors surfaced by `DiscoverySession` to its caller.
///
/// The first three variants are precondition failures of `start()`. They are
/// mutually exclusive and checked in declaration order.
#[non_exhaustive]
#[derive(Error, Debug, PartialEq)]
pub enum SessionError {
    #[error("bluetooth is not available on this device")]
    AdapterUnavailable,
    #[error("bluetooth is not enabled")]
    AdapterDisabled,
    #[error("required bluetooth permissions are not granted")]
    PermissionDenied,
    /// The adapter rejected a subscribe or start request.
    #[error("adapter error: {0}")]
    Adapter(#[source] BluetoothError),
    /// The adapter could not open a channel to the selected device.
    #[error("connect error: {0}")]
    Connect(#[source] BluetoothError),
}
