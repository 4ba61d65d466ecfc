//! XMRig 输出行的尽力而为解析
//!
//! worker 的输出格式是外部的、无版本约定的契约，所以这里是纯函数、永不报错：
//! 无法识别或数字转换失败的行直接返回空结果。

use crate::stats::StatUpdate;

/// 解析一行 worker 输出，返回其中包含的指标更新（可能为空）
///
/// 输入行会先整体小写再匹配；调用方无需预处理。
pub fn parse_line(line: &str) -> Vec<StatUpdate> {
    let line = line.trim().to_lowercase();
    let mut updates = Vec::new();

    if let Some(hashrate) = parse_hashrate(&line) {
        updates.push(StatUpdate::Hashrate(hashrate));
    }

    if let Some((accepted, rejected)) = parse_shares(&line) {
        updates.push(StatUpdate::Shares { accepted, rejected });
    }

    updates
}

/// 从形如 "speed 10s/60s/15m 2.5 kh/s max 3.1 kh/s" 的行里取第一个算力值
///
/// 第一个以 "h/s" 结尾的 token 是单位标记；其前一个 token 是数值。
/// 倍率后缀 k/m/g 可以挂在数值 token 末尾（"2.5k h/s"），也可以作为
/// 单位标记的前缀（"2.5 kh/s"）。
fn parse_hashrate(line: &str) -> Option<f64> {
    if !line.contains("h/s") {
        return None;
    }

    let parts: Vec<&str> = line.split_whitespace().collect();
    let marker_idx = parts.iter().position(|p| p.contains("h/s"))?;
    if marker_idx == 0 {
        return None;
    }

    let marker = parts[marker_idx].trim_end_matches(|c: char| !c.is_ascii_alphanumeric() && c != '/');
    let mut value_token = parts[marker_idx - 1];

    // 先看数值 token 自带的后缀，再退回到单位标记的前缀
    let mut multiplier = match value_token.as_bytes().last() {
        Some(b'k') => 1_000.0,
        Some(b'm') => 1_000_000.0,
        Some(b'g') => 1_000_000_000.0,
        _ => 1.0,
    };
    if multiplier != 1.0 {
        value_token = &value_token[..value_token.len() - 1];
    } else {
        multiplier = match marker.strip_suffix("h/s") {
            Some("k") => 1_000.0,
            Some("m") => 1_000_000.0,
            Some("g") => 1_000_000_000.0,
            _ => 1.0,
        };
    }

    let value: f64 = value_token.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value * multiplier)
}

/// 从形如 "accepted (120/3) diff 5000" 的行里取份额累计值
///
/// 匹配 "accepted" 关键字后紧跟的括号对 "(accepted/rejected)"。
fn parse_shares(line: &str) -> Option<(u64, u64)> {
    let idx = line.find("accepted")?;
    let rest = line[idx + "accepted".len()..].trim_start();
    let rest = rest.strip_prefix('(')?;
    let close = rest.find(')')?;
    let pair = &rest[..close];

    let (accepted, rejected) = pair.split_once('/')?;
    let accepted: u64 = accepted.trim().parse().ok()?;
    let rejected: u64 = rejected.trim().parse().ok()?;
    Some((accepted, rejected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashrate_unit_marker_prefix() {
        let updates = parse_line("speed 10s/60s/15m 2.5 kH/s max 3.1 kH/s");
        assert_eq!(updates, vec![StatUpdate::Hashrate(2500.0)]);
    }

    #[test]
    fn test_hashrate_no_suffix() {
        let updates = parse_line("miner speed 1234.5 H/s");
        assert_eq!(updates, vec![StatUpdate::Hashrate(1234.5)]);
    }

    #[test]
    fn test_hashrate_value_suffix() {
        assert_eq!(parse_line("speed 2.5k h/s"), vec![StatUpdate::Hashrate(2500.0)]);
        assert_eq!(parse_line("speed 1.5m h/s"), vec![StatUpdate::Hashrate(1_500_000.0)]);
        assert_eq!(parse_line("speed 2g h/s"), vec![StatUpdate::Hashrate(2_000_000_000.0)]);
    }

    #[test]
    fn test_hashrate_marker_suffix_variants() {
        assert_eq!(parse_line("speed 3.0 mh/s"), vec![StatUpdate::Hashrate(3_000_000.0)]);
        assert_eq!(parse_line("speed 1.2 gh/s"), vec![StatUpdate::Hashrate(1_200_000_000.0)]);
    }

    #[test]
    fn test_hashrate_first_marker_wins() {
        let updates = parse_line("speed 100 h/s avg 200 h/s");
        assert_eq!(updates, vec![StatUpdate::Hashrate(100.0)]);
    }

    #[test]
    fn test_hashrate_unparseable_number_is_skipped() {
        assert!(parse_line("speed n/a kh/s").is_empty());
        assert!(parse_line("h/s at start of line").is_empty());
    }

    #[test]
    fn test_shares_example() {
        let updates = parse_line("[2024-01-01] accepted (120/3) diff 5000");
        assert_eq!(
            updates,
            vec![StatUpdate::Shares { accepted: 120, rejected: 3 }]
        );
    }

    #[test]
    fn test_shares_keyword_form() {
        let updates = parse_line("new share accepted (42/1) diff 12000");
        assert_eq!(
            updates,
            vec![StatUpdate::Shares { accepted: 42, rejected: 1 }]
        );
    }

    #[test]
    fn test_shares_malformed_pair_is_skipped() {
        assert!(parse_line("accepted (abc/3) diff 5000").is_empty());
        assert!(parse_line("accepted 120/3 diff 5000").is_empty());
        assert!(parse_line("accepted (120) diff 5000").is_empty());
    }

    #[test]
    fn test_unrecognized_lines_yield_nothing() {
        assert!(parse_line("").is_empty());
        assert!(parse_line("[2024-01-01] net new job from pool.example.com:443").is_empty());
        assert!(parse_line("randomx dataset ready (1024 MB)").is_empty());
    }

    #[test]
    fn test_case_insensitive() {
        let updates = parse_line("SPEED 1.0 KH/S");
        assert_eq!(updates, vec![StatUpdate::Hashrate(1000.0)]);
    }

    #[test]
    fn test_line_with_both_patterns() {
        let updates = parse_line("accepted (5/0) speed 10 h/s");
        assert_eq!(updates.len(), 2);
        assert!(updates.contains(&StatUpdate::Hashrate(10.0)));
        assert!(updates.contains(&StatUpdate::Shares { accepted: 5, rejected: 0 }));
    }
}
