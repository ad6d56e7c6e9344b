//! Regulatory state limits
//!
//! Fixed, ordered analyte universe with the regulatory concentration ceiling
//! for each analyte (µg/g). Read-only process-wide state.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Limit of quantitation: computed results below this report as "ND"
pub const LOQ: f64 = 0.1;

/// Canonical analyte order with state limits
pub const STATE_LIMITS: [(&str, f64); 59] = [
    ("Abamectin", 0.5),
    ("Acephate", 0.4),
    ("Acequinocyl", 2.0),
    ("Acetamiprid", 0.2),
    ("Aldicarb", 0.4),
    ("Azoxystrobin", 0.2),
    ("Bifenazate", 0.2),
    ("Bifenthrin", 0.2),
    ("Boscalid", 0.4),
    ("Carbaryl", 0.2),
    ("Carbofuran", 0.2),
    ("Chlorantraniliprole", 0.2),
    ("Chlorfenapyr", 1.0),
    ("Chlorpyrifos", 0.2),
    ("Clofentezine", 0.2),
    ("Cyfluthrin", 1.0),
    ("Cypermethrin", 1.0),
    ("Daminozide", 1.0),
    ("Diazinon", 0.2),
    ("Dichlorvos", 1.0),
    ("Dimethoate", 0.2),
    ("Ethoprophos", 0.2),
    ("Etofenprox", 0.4),
    ("Etoxazole", 0.2),
    ("Fenoxycarb", 0.2),
    ("Fenpyroximate", 0.4),
    ("Fipronil", 0.4),
    ("Flonicamid", 1.0),
    ("Fludioxonil", 0.4),
    ("Hexythiazox", 1.0),
    ("Imazalil", 0.2),
    ("Imidacloprid", 0.4),
    ("Kresoxim-methyl", 0.4),
    ("Malathion A", 0.2),
    ("Metalaxyl", 0.2),
    ("Methiocarb", 0.2),
    ("Methomyl", 0.4),
    ("Methyl parathion", 0.2),
    ("MGK 264", 0.2),
    ("Myclobutanil", 0.2),
    ("Naled", 0.5),
    ("Oxamyl", 1.0),
    ("Paclobutrazol", 0.4),
    ("Permethrins*", 0.2),
    ("Phosmet", 0.2),
    ("Piperonyl butoxide", 2.0),
    ("Prallethrin", 0.2),
    ("Propiconazole", 0.4),
    ("Propoxure", 0.2),
    ("Pyrethrins*", 1.0),
    ("Pyridaben", 0.2),
    ("Spinosad*", 0.2),
    ("Spiromesifen", 0.2),
    ("Spirotetramat", 0.2),
    ("Spiroxamine", 0.4),
    ("Tebuconazole", 0.4),
    ("Thiacloprid", 0.2),
    ("Thiamethoxam", 0.2),
    ("Trifloxystrobin", 0.2),
];

static LIMIT_INDEX: Lazy<HashMap<&'static str, f64>> =
    Lazy::new(|| STATE_LIMITS.iter().copied().collect());

/// Canonical analyte names in report order
pub static ANALYTES: Lazy<Vec<&'static str>> =
    Lazy::new(|| STATE_LIMITS.iter().map(|(name, _)| *name).collect());

/// Registered limit for an analyte, if any
pub fn state_limit(analyte: &str) -> Option<f64> {
    LIMIT_INDEX.get(analyte).copied()
}

/// Whether the name is part of the canonical analyte universe
pub fn is_registered(analyte: &str) -> bool {
    LIMIT_INDEX.contains_key(analyte)
}
