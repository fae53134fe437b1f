// Static audit: scans every Rust source file for tracing calls that carry
// transcript text or identity fields. Logs may hold ids, counts,
// confidences and error classes only.
