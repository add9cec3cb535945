//! Built-in instrument list used when nothing is persisted yet

use rust_decimal::Decimal;

use crate::instrument::Instrument;

const MAJORS: &[(&str, &str, i64, i64)] = &[
    ("EURUSD", "Euro / US Dollar", 108450, 108470),
    ("GBPUSD", "British Pound / US Dollar", 126730, 126750),
    ("USDJPY", "US Dollar / Japanese Yen", 14985000, 14987000),
    ("USDCHF", "US Dollar / Swiss Franc", 88120, 88140),
    ("AUDUSD", "Australian Dollar / US Dollar", 65420, 65440),
    ("USDCAD", "US Dollar / Canadian Dollar", 135890, 135910),
    ("NZDUSD", "New Zealand Dollar / US Dollar", 60150, 60170),
    ("EURGBP", "Euro / British Pound", 85560, 85580),
];

/// The default major pairs, ids assigned from 1
pub fn default_instruments() -> Vec<Instrument> {
    MAJORS
        .iter()
        .enumerate()
        .map(|(idx, (symbol, name, bid, ask))| {
            Instrument::new(
                idx as i32 + 1,
                symbol,
                name,
                Decimal::new(*bid, 5),
                Decimal::new(*ask, 5),
            )
        })
        .collect()
}
