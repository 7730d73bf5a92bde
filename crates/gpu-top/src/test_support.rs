//! Renders `intel_gpu_top` output in each of its framing layouts.
//!
//! Only available with the `test-support` feature.

use std::time::Duration;

use tokio::io::{AsyncWriteExt, DuplexStream};

/// A single record, as written by `intel_gpu_top -J`.
///
/// Engine busy values are 1 (`Render/3D`), 2 (`Blitter`), 3 (`Video`) and
/// 4 (`VideoEnhance`). Power is 1W for the GPU and 4W for the package. There
/// is one client.
pub const SINGLE_PAYLOAD: &str = r#"{
	"period": {
		"duration": 1048.677745,
		"unit": "ms"
	},
	"frequency": {
		"requested": 0.000000,
		"actual": 0.000000,
		"unit": "MHz"
	},
	"interrupts": {
		"count": 0.000000,
		"unit": "irq/s"
	},
	"rc6": {
		"value": 99.999597,
		"unit": "%"
	},
	"power": {
		"GPU": 1.000000,
		"Package": 4.000000,
		"unit": "W"
	},
	"imc-bandwidth": {
		"reads": 503.442586,
		"writes": 51.315726,
		"unit": "MiB/s"
	},
	"engines": {
		"Render/3D": {
			"busy": 1.000000,
			"sema": 0.000000,
			"wait": 0.000000,
			"unit": "%"
		},
		"Blitter": {
			"busy": 2.000000,
			"sema": 0.000000,
			"wait": 0.000000,
			"unit": "%"
		},
		"Video": {
			"busy": 3.000000,
			"sema": 0.000000,
			"wait": 0.000000,
			"unit": "%"
		},
		"VideoEnhance": {
			"busy": 4.000000,
			"sema": 0.000000,
			"wait": 0.000000,
			"unit": "%"
		}
	},
	"clients": {
		"4293539623": {
			"name": "foo",
			"pid": "1427673",
			"engine-classes": {
				"Render/3D": {
					"busy": "0.000000",
					"unit": "%"
				},
				"Blitter": {
					"busy": "0.000000",
					"unit": "%"
				},
				"Video": {
					"busy": "0.000000",
					"unit": "%"
				},
				"VideoEnhance": {
					"busy": "0.000000",
					"unit": "%"
				}
			}
		}
	}
}"#;

/// Framing layouts observed across `intel_gpu_top` versions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    /// Bare concatenated objects (v1.17).
    Bare,

    /// Objects inside a JSON array, separated by commas (v1.18).
    ArrayWithCommas,

    /// Objects inside a JSON array without separators (v1.18, sometimes).
    ArrayWithoutCommas,
}

impl Dialect {
    /// All layouts.
    pub const ALL: [Self; 3] = [Self::Bare, Self::ArrayWithCommas, Self::ArrayWithoutCommas];

    const fn is_array(self) -> bool {
        !matches!(self, Self::Bare)
    }

    const fn has_commas(self) -> bool {
        matches!(self, Self::ArrayWithCommas)
    }

    /// Bytes written before the first record.
    #[must_use]
    pub const fn prefix(self) -> &'static [u8] {
        if self.is_array() { b"[\n" } else { b"" }
    }

    /// Bytes written before record number `index`.
    #[must_use]
    pub const fn separator(self, index: usize) -> &'static [u8] {
        if index != 0 && self.has_commas() {
            b",\n"
        } else {
            b"\n"
        }
    }

    /// Bytes written after the last record.
    #[must_use]
    pub const fn suffix(self) -> &'static [u8] {
        if self.is_array() { b"\n]\n" } else { b"" }
    }
}

/// Renders `count` copies of `payload` in the given layout.
#[must_use]
pub fn render(payload: &str, count: usize, dialect: Dialect) -> Vec<u8> {
    let mut output = dialect.prefix().to_vec();
    for index in 0..count {
        output.extend_from_slice(dialect.separator(index));
        output.extend_from_slice(payload.as_bytes());
    }
    output.extend_from_slice(dialect.suffix());
    output
}

/// Writes `count` copies of `payload` to a pipe, one every `delay`.
///
/// The pipe is closed once everything has been written, or earlier if the
/// reading side goes away. Must be called from within a tokio runtime.
#[must_use]
pub fn fake_server(payload: &str, count: usize, dialect: Dialect, delay: Duration) -> DuplexStream {
    let (mut writer, reader) = tokio::io::duplex(64 * 1024);
    let payload = payload.to_string();

    tokio::spawn(async move {
        if writer.write_all(dialect.prefix()).await.is_err() {
            return;
        }

        for index in 0..count {
            tokio::time::sleep(delay).await;

            if writer.write_all(dialect.separator(index)).await.is_err()
                || writer.write_all(payload.as_bytes()).await.is_err()
            {
                return;
            }
        }

        let _ = writer.write_all(dialect.suffix()).await;
    });

    reader
}
