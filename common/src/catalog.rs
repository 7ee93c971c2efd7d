//! Display currencies offered by the currency selector.

use serde::Serialize;

use crate::Currency;

/// A currency the portal lets users pick as their display currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CurrencyOption {
    /// Currency code.
    pub code: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Flag glyph shown next to the name.
    pub flag: &'static str,
}

/// Supported display currencies, in selector order.
pub const CURRENCY_OPTIONS: &[CurrencyOption] = &[
    CurrencyOption { code: "TND", name: "Dinar tunisien", flag: "🇹🇳" },
    CurrencyOption { code: "EUR", name: "Euro", flag: "🇪🇺" },
    CurrencyOption { code: "USD", name: "Dollar américain", flag: "🇺🇸" },
    CurrencyOption { code: "GBP", name: "Livre sterling", flag: "🇬🇧" },
    CurrencyOption { code: "AED", name: "Dirham émirati", flag: "🇦🇪" },
    CurrencyOption { code: "SAR", name: "Riyal saoudien", flag: "🇸🇦" },
    CurrencyOption { code: "QAR", name: "Riyal qatari", flag: "🇶🇦" },
    CurrencyOption { code: "EGP", name: "Livre égyptienne", flag: "🇪🇬" },
    CurrencyOption { code: "OMR", name: "Rial omanais", flag: "🇴🇲" },
    CurrencyOption { code: "KWD", name: "Dinar koweïtien", flag: "🇰🇼" },
    CurrencyOption { code: "BHD", name: "Dinar bahreïni", flag: "🇧🇭" },
    CurrencyOption { code: "MAD", name: "Dirham marocain", flag: "🇲🇦" },
    CurrencyOption { code: "DZD", name: "Dinar algérien", flag: "🇩🇿" },
    CurrencyOption { code: "LYD", name: "Dinar libyen", flag: "🇱🇾" },
    CurrencyOption { code: "JPY", name: "Yen japonais", flag: "🇯🇵" },
    CurrencyOption { code: "CNY", name: "Yuan chinois", flag: "🇨🇳" },
    CurrencyOption { code: "CAD", name: "Dollar canadien", flag: "🇨🇦" },
    CurrencyOption { code: "AUD", name: "Dollar australien", flag: "🇦🇺" },
    CurrencyOption { code: "CHF", name: "Franc suisse", flag: "🇨🇭" },
    CurrencyOption { code: "TRY", name: "Livre turque", flag: "🇹🇷" },
];

impl CurrencyOption {
    /// Look up a catalog entry by exact code.
    pub fn find(code: &str) -> Option<&'static CurrencyOption> {
        CURRENCY_OPTIONS.iter().find(|option| option.code == code)
    }

    /// All catalog entries.
    pub fn all() -> &'static [CurrencyOption] {
        CURRENCY_OPTIONS
    }

    pub fn currency(&self) -> Currency {
        Currency::new(self.code)
    }
}
