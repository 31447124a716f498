use serde::Deserialize;
use serde_json::Value;

/// Accepts JSON numbers and numeric strings ("1.90", " 2 ").
pub fn lenient_f64(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// First alias that carries a positive number.
fn first_positive(aliases: &[&Option<Value>]) -> Option<f64> {
    aliases
        .iter()
        .filter_map(|v| Option::as_ref(*v).and_then(lenient_f64))
        .find(|n| *n > 0.0)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TwelveDataQuote {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    previous_close: Option<Value>,
    #[serde(default)]
    prev_close: Option<Value>,
    #[serde(default)]
    close: Option<Value>,
    #[serde(default)]
    last_price: Option<Value>,
    #[serde(default)]
    price: Option<Value>,
}

impl TwelveDataQuote {
    pub fn previous_close(&self) -> Option<f64> {
        first_positive(&[&self.previous_close, &self.prev_close])
    }

    pub fn last_price(&self) -> Option<f64> {
        first_positive(&[&self.close, &self.last_price, &self.price])
    }

    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some("error")
    }
}

/// Symbols from a market-movers payload, in ranked order.
///
/// `None` when the API answered with an error object (for example when the
/// endpoint is not part of the current plan).
pub fn mover_symbols(v: &Value) -> Option<Vec<String>> {
    let rows = match v {
        Value::Object(o) => {
            if o.get("status").and_then(Value::as_str) == Some("error") {
                return None;
            }
            o.get("data")
                .or_else(|| o.get("values"))
                .and_then(Value::as_array)?
        }
        Value::Array(a) => a,
        _ => return None,
    };

    let symbols = rows
        .iter()
        .filter_map(|row| match row {
            Value::String(s) => Some(s.as_str()),
            Value::Object(o) => o.get("symbol").and_then(Value::as_str),
            _ => None,
        })
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    Some(symbols)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FmpPriceTarget {
    #[serde(default)]
    target: Option<Value>,
    #[serde(default, rename = "priceTarget")]
    price_target: Option<Value>,
}

impl FmpPriceTarget {
    pub fn value(&self) -> Option<f64> {
        first_positive(&[&self.target, &self.price_target])
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FmpConsensus {
    #[serde(default, rename = "targetConsensus")]
    target_consensus: Option<Value>,
    #[serde(default)]
    consensus: Option<Value>,
    #[serde(default)]
    mean: Option<Value>,
}

impl FmpConsensus {
    pub fn value(&self) -> Option<f64> {
        first_positive(&[&self.target_consensus, &self.consensus, &self.mean])
    }
}
