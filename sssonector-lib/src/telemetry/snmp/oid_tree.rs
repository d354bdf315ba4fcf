//! The read-only SNMP MIB this agent exposes (spec §4.7 "OID layout under
//! the SSSonector enterprise root").

use crate::config::Role;
use crate::telemetry::metrics::MetricsSnapshot;

use super::pdu::SnmpValue;

/// `1.3.6.1.4.1.<sssonector>` -- an unregistered placeholder enterprise
/// number, fine for a point-to-point tool with no public MIB registration.
pub const ENTERPRISE_ROOT: [u32; 7] = [1, 3, 6, 1, 4, 1, 64512];

fn oid(suffix: &[u32]) -> Vec<u32> {
    let mut full = ENTERPRISE_ROOT.to_vec();
    full.extend_from_slice(suffix);
    full
}

fn read_proc_self_cpu_ticks() -> u64 {
    std::fs::read_to_string("/proc/self/stat")
        .ok()
        .and_then(|s| {
            let after_comm = s.rsplit_once(')')?.1;
            let fields: Vec<&str> = after_comm.split_whitespace().collect();
            // utime is field 14, stime field 15 counting from `pid` as 1; after
            // splitting off "pid (comm) ", `state` is fields[0].
            let utime: u64 = fields.get(11)?.parse().ok()?;
            let stime: u64 = fields.get(12)?.parse().ok()?;
            Some(utime + stime)
        })
        .unwrap_or(0)
}

fn read_proc_self_rss_kb() -> u64 {
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|s| {
            s.lines().find_map(|line| {
                line.strip_prefix("VmRSS:").map(|rest| {
                    rest.trim().trim_end_matches(" kB").trim().parse::<u64>().unwrap_or(0)
                })
            })
        })
        .unwrap_or(0)
}

/// Builds the full, lexicographically-ordered (by OID) list of leaves
/// currently exposed. Rebuilt per-request since counters change; cheap
/// relative to a UDP round trip.
pub fn build_tree(
    snapshot: &MetricsSnapshot,
    role: Role,
    version: &str,
) -> Vec<(Vec<u32>, SnmpValue)> {
    let role_code = match role {
        Role::Server => 1,
        Role::Client => 2,
    };

    vec![
        // .1 System
        (oid(&[1, 1]), SnmpValue::OctetString(version.as_bytes().to_vec())),
        (oid(&[1, 2]), SnmpValue::TimeTicks((snapshot.uptime_seconds * 100) as u32)),
        (oid(&[1, 3]), SnmpValue::Integer(role_code)),
        // .2 Network
        (oid(&[2, 1]), SnmpValue::Counter32(snapshot.bytes_in as u32)),
        (oid(&[2, 2]), SnmpValue::Counter32(snapshot.bytes_out as u32)),
        (oid(&[2, 3]), SnmpValue::Counter32(snapshot.packets_in as u32)),
        (oid(&[2, 4]), SnmpValue::Counter32(snapshot.packets_out as u32)),
        (oid(&[2, 5]), SnmpValue::Gauge32(snapshot.current_sessions as u32)),
        (oid(&[2, 6]), SnmpValue::Gauge32(snapshot.peak_sessions as u32)),
        // .3 RateLimit
        (oid(&[3, 1]), SnmpValue::Gauge32(snapshot.current_rate_in as u32)),
        (oid(&[3, 2]), SnmpValue::Gauge32(snapshot.current_rate_out as u32)),
        (oid(&[3, 3]), SnmpValue::Gauge32(snapshot.rate_limit as u32)),
        (oid(&[3, 4]), SnmpValue::Gauge32(snapshot.burst_limit as u32)),
        (oid(&[3, 5]), SnmpValue::Counter32(snapshot.rate_limit_hits as u32)),
        (oid(&[3, 6]), SnmpValue::Counter32(snapshot.adjust_count as u32)),
        // .4 Errors
        (oid(&[4, 1]), SnmpValue::Counter32(snapshot.errors_total as u32)),
        (oid(&[4, 2]), SnmpValue::Counter32(snapshot.connection_errors as u32)),
        (oid(&[4, 3]), SnmpValue::Counter32(snapshot.protocol_errors as u32)),
        // .5 Resources
        (oid(&[5, 1]), SnmpValue::Gauge32(read_proc_self_cpu_ticks() as u32)),
        (oid(&[5, 2]), SnmpValue::Gauge32(read_proc_self_rss_kb() as u32)),
    ]
}

pub fn find_exact<'a>(tree: &'a [(Vec<u32>, SnmpValue)], target: &[u32]) -> Option<&'a SnmpValue> {
    tree.iter().find(|(oid, _)| oid.as_slice() == target).map(|(_, v)| v)
}

/// Lexicographic `>` comparison over OID arc sequences, per GETNEXT/GETBULK
/// traversal semantics.
pub fn find_next<'a>(
    tree: &'a [(Vec<u32>, SnmpValue)],
    after: &[u32],
) -> Option<&'a (Vec<u32>, SnmpValue)> {
    tree.iter().find(|(oid, _)| oid.as_slice() > after)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Vec<(Vec<u32>, SnmpValue)> {
        build_tree(&MetricsSnapshot::default(), Role::Server, "0.1.0")
    }

    #[test]
    fn tree_is_sorted_lexicographically() {
        let tree = sample_tree();
        for pair in tree.windows(2) {
            assert!(pair[0].0 < pair[1].0, "{:?} should sort before {:?}", pair[0].0, pair[1].0);
        }
    }

    #[test]
    fn find_exact_matches_system_version() {
        let tree = sample_tree();
        let target = oid(&[1, 1]);
        assert!(find_exact(&tree, &target).is_some());
    }

    #[test]
    fn find_next_walks_past_last_system_leaf() {
        let tree = sample_tree();
        let after = oid(&[1, 3]);
        let (next_oid, _) = find_next(&tree, &after).unwrap();
        assert_eq!(next_oid, &oid(&[2, 1]));
    }

    #[test]
    fn find_next_at_end_returns_none() {
        let tree = sample_tree();
        let last = tree.last().unwrap().0.clone();
        assert!(find_next(&tree, &last).is_none());
    }
}
