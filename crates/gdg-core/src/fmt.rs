//! Shared formatting helpers for operator-facing output.

/// Format byte count as human-readable size: `"1.5 GiB"`, `"100.3 MiB"`,
/// `"50.0 KiB"`, `"512 B"`.
pub fn format_bytes(bytes: u64) -> String {
    const GIB: u64 = 1024 * 1024 * 1024;
    const MIB: u64 = 1024 * 1024;
    const KIB: u64 = 1024;

    let f = bytes as f64;
    if bytes >= GIB {
        format!("{:.1} GiB", f / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", f / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", f / KIB as f64)
    } else {
        format!("{} B", bytes)
    }
}
