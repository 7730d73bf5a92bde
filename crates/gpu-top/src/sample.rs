use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One record of `intel_gpu_top -J` output.
///
/// Sections the tool leaves out (`power` and `imc-bandwidth` are missing on
/// some hardware) decode to their zero value.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Sample {
    /// Length of the sampling period.
    pub period: Period,

    /// GPU frequency.
    pub frequency: Frequency,

    /// Interrupt rate.
    pub interrupts: Interrupts,

    /// Share of the period the GPU spent idle (RC6 residency).
    #[serde(rename = "rc6")]
    pub idle: IdleRatio,

    /// Power draw.
    pub power: Power,

    /// Memory controller bandwidth.
    #[serde(rename = "imc-bandwidth")]
    pub memory_bandwidth: MemoryBandwidth,

    /// Utilization per engine, keyed by engine name (e.g. `Render/3D`).
    pub engines: HashMap<String, EngineUsage>,

    /// Clients using the GPU, keyed by client id.
    pub clients: HashMap<String, Client>,
}

#[allow(missing_docs)]
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Period {
    pub duration: f64,
    pub unit: String,
}

#[allow(missing_docs)]
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Frequency {
    pub requested: f64,
    pub actual: f64,
    pub unit: String,
}

#[allow(missing_docs)]
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Interrupts {
    pub count: f64,
    pub unit: String,
}

#[allow(missing_docs)]
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct IdleRatio {
    pub value: f64,
    pub unit: String,
}

/// Power draw of the GPU and of the whole package.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Power {
    /// GPU power draw.
    #[serde(rename = "GPU")]
    pub gpu: f64,

    /// Package power draw.
    #[serde(rename = "Package")]
    pub package: f64,

    /// Unit of both values (normally `W`).
    pub unit: String,
}

#[allow(missing_docs)]
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct MemoryBandwidth {
    pub reads: f64,
    pub writes: f64,
    pub unit: String,
}

/// Utilization of one GPU engine.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct EngineUsage {
    /// Time the engine was busy.
    pub busy: f64,

    /// Time the engine was waiting on a semaphore.
    pub sema: f64,

    /// Time the engine was waiting on memory.
    pub wait: f64,

    /// Unit of the three values (normally `%`).
    pub unit: String,
}

/// A process using the GPU.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Client {
    /// Process name.
    pub name: String,

    /// Process id. `intel_gpu_top` reports it as a string.
    pub pid: String,

    /// Busy time of the client per engine class.
    #[serde(rename = "engine-classes")]
    pub engine_classes: HashMap<String, ClientEngineClass>,
}

/// Busy time of one client on one engine class.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct ClientEngineClass {
    /// Busy time, as the string `intel_gpu_top` writes (e.g. `"0.000000"`).
    pub busy: String,

    #[allow(missing_docs)]
    pub unit: String,
}
