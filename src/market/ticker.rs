//! Ticker symbol normalisation for the market data API.

/// Marker written by the ticker lookup step when no symbol was found.
pub const TICKER_NOT_FOUND: &str = "Ticker not found";

/// Normalise a raw ticker symbol.
///
/// Regional German listings (Stuttgart `.SG`, Hanover `.HA`) are mapped to
/// the Xetra `.DE` listing, which the API covers more reliably. Returns
/// `None` for empty values and lookup failure markers.
pub fn clean_ticker(raw: &str) -> Option<String> {
    let mut ticker = raw.trim();
    if ticker.is_empty() || ticker == TICKER_NOT_FOUND || ticker.starts_with("Error:") {
        return None;
    }

    if let Some(stripped) = ticker.strip_prefix('$') {
        ticker = stripped;
    }

    // ISIN-like identifiers carrying a regional suffix
    if ticker.len() > 12 && ticker.matches('.').count() == 1 {
        if let Some((base, exchange)) = ticker.split_once('.') {
            if exchange.ends_with("SG") || exchange.ends_with("HA") {
                return Some(format!("{}.DE", base));
            }
        }
    }

    let cleaned = if ticker.contains(".SW") {
        ticker.to_string()
    } else if ticker.contains(".SG") {
        ticker.replace(".SG", ".DE")
    } else if ticker.contains(".HA") {
        ticker.replace(".HA", ".DE")
    } else {
        ticker.to_string()
    };

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_tickers() {
        assert_eq!(clean_ticker(" AAPL "), Some("AAPL".to_string()));
        assert_eq!(clean_ticker("$MSFT"), Some("MSFT".to_string()));
        assert_eq!(clean_ticker("NESN.SW"), Some("NESN.SW".to_string()));
    }

    #[test]
    fn test_german_regional_exchanges() {
        assert_eq!(clean_ticker("BMW.SG"), Some("BMW.DE".to_string()));
        assert_eq!(clean_ticker("HNR1.HA"), Some("HNR1.DE".to_string()));
        assert_eq!(
            clean_ticker("DE0007164600.XSG"),
            Some("DE0007164600.DE".to_string())
        );
    }

    #[test]
    fn test_missing_values() {
        assert_eq!(clean_ticker(""), None);
        assert_eq!(clean_ticker("   "), None);
        assert_eq!(clean_ticker(TICKER_NOT_FOUND), None);
        assert_eq!(clean_ticker("Error: timeout"), None);
        assert_eq!(clean_ticker("$"), None);
    }
}
