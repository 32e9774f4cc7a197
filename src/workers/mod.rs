mod overdue_scan;

pub use overdue_scan::{OverdueScanConfig, OverdueScanner, ScanStats};
