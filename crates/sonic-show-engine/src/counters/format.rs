//! Display rendering of rates and counters.

use super::MISSING_VALUE;

/// Byte rate bucketed into B/s, KB/s or MB/s.
pub fn byte_rate(rate: Option<f64>) -> String {
    let Some(rate) = rate else {
        return MISSING_VALUE.to_string();
    };
    if rate > 10.0 * 1e6 {
        format!("{:.2} MB/s", rate / 1e6)
    } else if rate > 10.0 * 1e3 {
        format!("{:.2} KB/s", rate / 1e3)
    } else {
        format!("{:.2} B/s", rate)
    }
}

/// Packet rate with two decimals.
pub fn packet_rate(rate: Option<f64>) -> String {
    match rate {
        Some(rate) => format!("{:.2}/s", rate),
        None => MISSING_VALUE.to_string(),
    }
}

/// Utilization percentage with two decimals.
pub fn utilization(util: Option<f64>) -> String {
    match util {
        Some(util) => format!("{:.2}%", util),
        None => MISSING_VALUE.to_string(),
    }
}

/// Bit error rate in scientific notation with a two-digit signed exponent
/// (`1.23e-05`).
pub fn ber(ber: Option<f64>) -> String {
    let Some(ber) = ber else {
        return MISSING_VALUE.to_string();
    };
    let formatted = format!("{:.2e}", ber);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(exp) => format!(
                "{}e{}{:02}",
                mantissa,
                if exp < 0 { '-' } else { '+' },
                exp.abs()
            ),
            Err(_) => formatted,
        },
        None => formatted,
    }
}

/// Parses a rate field; non-numeric and non-finite values are missing.
pub fn parse_rate(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Utilization derived from a byte rate and a port speed in Mb/s.
pub fn derived_utilization(byte_rate: Option<f64>, speed_mbps: Option<f64>) -> Option<f64> {
    let (rate, speed) = (byte_rate?, speed_mbps?);
    if speed <= 0.0 {
        return None;
    }
    Some(rate / (speed * 1e6 / 8.0) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_rate_buckets() {
        assert_eq!(byte_rate(Some(512.0)), "512.00 B/s");
        assert_eq!(byte_rate(Some(10_000.0)), "10000.00 B/s");
        assert_eq!(byte_rate(Some(10_001.0)), "10.00 KB/s");
        assert_eq!(byte_rate(Some(25_000_000.0)), "25.00 MB/s");
        assert_eq!(byte_rate(None), "N/A");
    }

    #[test]
    fn test_packet_rate_and_util() {
        assert_eq!(packet_rate(Some(1.23456)), "1.23/s");
        assert_eq!(packet_rate(None), "N/A");
        assert_eq!(utilization(Some(12.346)), "12.35%");
        assert_eq!(utilization(None), "N/A");
    }

    #[test]
    fn test_ber_exponent_form() {
        assert_eq!(ber(Some(0.0000123)), "1.23e-05");
        assert_eq!(ber(Some(1234.0)), "1.23e+03");
        assert_eq!(ber(Some(0.0)), "0.00e+00");
        assert_eq!(ber(None), "N/A");
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate(Some("1.5")), Some(1.5));
        assert_eq!(parse_rate(Some("N/A")), None);
        assert_eq!(parse_rate(Some("inf")), None);
        assert_eq!(parse_rate(None), None);
    }

    #[test]
    fn test_derived_utilization() {
        // 100G port carrying 1.25 GB/s is at 10%
        let util = derived_utilization(Some(1.25e9), Some(100_000.0)).unwrap();
        assert!((util - 10.0).abs() < 1e-9);
        assert_eq!(derived_utilization(Some(1.0), Some(0.0)), None);
        assert_eq!(derived_utilization(None, Some(100_000.0)), None);
    }
}
