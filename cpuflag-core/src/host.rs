//! Host CPU model detection.
//!
//! Maps the host's vendor and flags onto the named QEMU models it can run.
//! Within a vendor the models are listed most capable first.

use tracing::debug;

use crate::cpuinfo::HostCpu;
use crate::error::{Error, Result};

struct ModelRequirement {
    name: &'static str,
    flags: &'static [&'static str],
}

const INTEL_MODELS: &[ModelRequirement] = &[
    ModelRequirement {
        name: "Haswell",
        flags: &[
            "fma", "avx2", "movbe", "bmi1", "bmi2", "fsgsbase", "erms", "smep", "avx", "xsave",
            "aes", "sse4.2", "sse4.1", "cx16", "ssse3",
        ],
    },
    ModelRequirement {
        name: "SandyBridge",
        flags: &["avx", "xsave", "aes", "sse4.2", "sse4.1", "cx16", "ssse3"],
    },
    ModelRequirement {
        name: "Westmere",
        flags: &["aes", "sse4.2", "sse4.1", "cx16", "ssse3"],
    },
    ModelRequirement {
        name: "Nehalem",
        flags: &["sse4.2", "sse4.1", "cx16", "ssse3"],
    },
    ModelRequirement {
        name: "Penryn",
        flags: &["sse4.1", "cx16", "ssse3"],
    },
    ModelRequirement {
        name: "Conroe",
        flags: &["ssse3"],
    },
];

const AMD_MODELS: &[ModelRequirement] = &[
    ModelRequirement {
        name: "Opteron_G5",
        flags: &[
            "f16c", "fma", "tbm", "fma4", "xop", "avx", "xsave", "aes", "sse4.2", "sse4.1",
            "cx16", "ssse3", "sse4a",
        ],
    },
    ModelRequirement {
        name: "Opteron_G4",
        flags: &[
            "fma4", "xop", "avx", "xsave", "aes", "sse4.2", "sse4.1", "cx16", "ssse3", "sse4a",
        ],
    },
    ModelRequirement {
        name: "Opteron_G3",
        flags: &["cx16", "sse4a"],
    },
    ModelRequirement {
        name: "Opteron_G2",
        flags: &["cx16"],
    },
    ModelRequirement {
        name: "Opteron_G1",
        flags: &[],
    },
];

fn vendor_models(vendor: &str) -> &'static [ModelRequirement] {
    match vendor {
        "GenuineIntel" => INTEL_MODELS,
        "AuthenticAMD" => AMD_MODELS,
        _ => &[],
    }
}

/// Models the host can run, most capable first. Empty for unknown vendors.
pub fn host_cpu_models(host: &HostCpu) -> Vec<String> {
    let Some(vendor) = host.vendor.as_deref() else {
        return Vec::new();
    };
    vendor_models(vendor)
        .iter()
        .filter(|model| {
            model.flags.iter().all(|req| {
                req.split('|')
                    .any(|alternative| host.flags.contains_name(alternative))
            })
        })
        .map(|model| model.name.to_string())
        .collect()
}

/// Picks the model whose flags the guest should see.
///
/// A guest model the host can run is used as is. Anything else (`host`, an
/// unset model, or a model newer than the host) falls back to the most
/// capable host model.
pub fn select_model(
    guest_model: Option<&str>,
    host_models: &[String],
    vendor: Option<&str>,
) -> Result<String> {
    if let Some(model) = guest_model {
        if host_models.iter().any(|m| m == model) {
            return Ok(model.to_string());
        }
    }
    let fallback = host_models
        .first()
        .cloned()
        .ok_or_else(|| Error::NoHostModel(vendor.map(str::to_string)))?;
    debug!(
        "guest model {:?} not runnable on host, using {}",
        guest_model, fallback
    );
    Ok(fallback)
}
