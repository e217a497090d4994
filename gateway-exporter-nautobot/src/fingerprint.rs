//! Content-derived identity of a metric series.

use std::fmt;
use std::hash::Hasher;

use siphasher::sip::SipHasher13;

use crate::mapping::{Labels, MetricIdentity};

/// Deterministic hash over a metric name and its labels.
///
/// Label pairs are hashed independently and combined with a commutative
/// sum, so the label map's iteration order never changes the result.
/// SipHash-1-3 with zero keys over explicit byte encodings keeps the value
/// stable across Rust releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn of(name: &str, labels: &Labels) -> Self {
        let labels_sum = labels.iter().fold(0u64, |acc, (key, value)| {
            let mut hasher = SipHasher13::new();
            write_str(&mut hasher, key);
            write_str(&mut hasher, value);
            acc.wrapping_add(hasher.finish())
        });

        let mut hasher = SipHasher13::new();
        write_str(&mut hasher, name);
        hasher.write_u64(labels.len() as u64);
        hasher.write_u64(labels_sum);
        Self(hasher.finish())
    }

    pub fn of_identity(identity: &MetricIdentity) -> Self {
        Self::of(&identity.name, &identity.labels)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

// Length prefix keeps ("ab", "c") apart from ("a", "bc").
fn write_str(hasher: &mut SipHasher13, s: &str) {
    hasher.write_u64(s.len() as u64);
    hasher.write(s.as_bytes());
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let l = labels(&[("target", "R2"), ("interfaces_interface_name", "eth0")]);
        let a = Fingerprint::of("interfaces_interface_state_oper_status", &l);
        let b = Fingerprint::of("interfaces_interface_state_oper_status", &l.clone());
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_ignores_label_order() {
        let pairs = [
            ("target", "R2"),
            ("interfaces_interface_name", "eth0"),
            ("interfaces_interface_subinterfaces_subinterface_index", "0"),
            ("x", "y"),
        ];

        let forward = labels(&pairs);
        let mut reversed = Labels::with_capacity(1);
        for (k, v) in pairs.iter().rev() {
            reversed.insert(k.to_string(), v.to_string());
        }

        assert_eq!(
            Fingerprint::of("metric", &forward),
            Fingerprint::of("metric", &reversed)
        );
    }

    #[test]
    fn test_fingerprint_distinguishes_content() {
        let base = labels(&[("target", "R2"), ("interfaces_interface_name", "eth0")]);
        let fp = Fingerprint::of("oper_status", &base);

        assert_ne!(fp, Fingerprint::of("admin_status", &base));
        assert_ne!(
            fp,
            Fingerprint::of(
                "oper_status",
                &labels(&[("target", "R3"), ("interfaces_interface_name", "eth0")])
            )
        );
        assert_ne!(
            fp,
            Fingerprint::of("oper_status", &labels(&[("target", "R2")]))
        );
        // Swapping a key and its value is a different label set.
        assert_ne!(
            Fingerprint::of("m", &labels(&[("a", "b")])),
            Fingerprint::of("m", &labels(&[("b", "a")]))
        );
        assert_ne!(
            Fingerprint::of("m", &labels(&[("ab", "c")])),
            Fingerprint::of("m", &labels(&[("a", "bc")]))
        );
    }

    #[test]
    fn test_fingerprint_uses_fixed_algorithm() {
        let mut hasher = SipHasher13::new_with_keys(0, 0);
        hasher.write_u64(4);
        hasher.write(b"name");
        hasher.write_u64(0);
        hasher.write_u64(0);

        assert_eq!(
            Fingerprint::of("name", &Labels::new()).as_u64(),
            hasher.finish()
        );
    }

    #[test]
    fn test_fingerprint_display_is_hex() {
        let fp = Fingerprint::of("m", &Labels::new());
        let text = fp.to_string();
        assert_eq!(text.len(), 16);
        assert_eq!(u64::from_str_radix(&text, 16).unwrap(), fp.as_u64());
    }
}
