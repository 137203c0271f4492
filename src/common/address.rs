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

use std::{fmt, str::FromStr};

use super::BluetoothError;

/// Struct representing a 48-bit BT Classic address. Bytes are stored least
/// significant first, the way the radio reports them.
#[derive(PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct ClassicAddress([u8; 6]);

impl ClassicAddress {
    /// Build an address from its six bytes, most significant first, i.e. in
    /// the order they are written out (`AA:BB:CC:DD:EE:FF`).
    pub fn from_be_bytes(bytes: [u8; 6]) -> Self {
        let mut val = bytes;
        val.reverse();
        ClassicAddress(val)
    }
}

/// Function for converting the six LSB of a u64 into a 6-byte array.
#[inline]
fn u64_to_6lsb(num: u64) -> [u8; 6] {
    let bytes = num.to_le_bytes();
    [bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]]
}

impl From<u64> for ClassicAddress {
    fn from(addr: u64) -> Self {
        ClassicAddress(u64_to_6lsb(addr))
    }
}

impl From<ClassicAddress> for u64 {
    fn from(addr: ClassicAddress) -> Self {
        let mut bytes = [0u8; 8];
        bytes[..6].copy_from_slice(&addr.0);

        u64::from_le_bytes(bytes)
    }
}

impl fmt::Display for ClassicAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[5], b[4], b[3], b[2], b[1], b[0]
        )
    }
}

impl fmt::Debug for ClassicAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassicAddress({})", self)
    }
}

impl FromStr for ClassicAddress {
    type Err = BluetoothError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let groups: Vec<&str> = s.split(':').collect();
        if groups.len() != 6 {
            return Err(BluetoothError::BadTypeConversion(format!(
                "expected 6 colon-separated groups in address `{}`",
                s
            )));
        }

        let mut bytes = [0u8; 6];
        for (byte, group) in bytes.iter_mut().zip(groups) {
            if group.len() != 2 {
                return Err(BluetoothError::BadTypeConversion(format!(
                    "bad address group `{}` in `{}`",
                    group, s
                )));
            }
            *byte = u8::from_str_radix(group, 16).map_err(|_| {
                BluetoothError::BadTypeConversion(format!(
                    "bad address group `{}` in `{}`",
                    group, s
                ))
            })?;
        }

        Ok(ClassicAddress::from_be_bytes(bytes))
    }
}
