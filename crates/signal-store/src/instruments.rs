use tracker_core::{Instrument, Result};

use crate::db::{map_db_err, SignalStore};

#[derive(sqlx::FromRow)]
struct InstrumentRow {
    figi: String,
    ticker: String,
    name: String,
    #[sqlx(rename = "type")]
    instrument_type: String,
    currency: Option<String>,
    lot: Option<i32>,
    is_active: bool,
}

impl InstrumentRow {
    fn into_instrument(self) -> Instrument {
        Instrument {
            figi: self.figi,
            ticker: self.ticker,
            name: self.name,
            instrument_type: self.instrument_type,
            currency: self.currency,
            lot: self.lot,
            is_active: self.is_active,
        }
    }
}

impl SignalStore {
    pub async fn get_instrument_by_ticker(&self, ticker: &str) -> Result<Option<Instrument>> {
        let row = sqlx::query_as::<_, InstrumentRow>(
            "SELECT figi, ticker, name, type, currency, lot, is_active
             FROM instruments WHERE ticker = $1",
        )
        .bind(ticker)
        .fetch_optional(self.pool())
        .await
        .map_err(map_db_err)?;

        Ok(row.map(InstrumentRow::into_instrument))
    }

    /// Resolve ticker to FIGI without loading the whole instrument.
    pub async fn figi_for_ticker(&self, ticker: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT figi FROM instruments WHERE ticker = $1")
                .bind(ticker)
                .fetch_optional(self.pool())
                .await
                .map_err(map_db_err)?;
        Ok(row.map(|(figi,)| figi))
    }

    /// Upsert an instrument by FIGI.
    pub async fn save_instrument(&self, instrument: &Instrument) -> Result<()> {
        sqlx::query(
            "INSERT INTO instruments (figi, ticker, name, type, currency, lot, is_active)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (figi) DO UPDATE SET
                 ticker = EXCLUDED.ticker,
                 name = EXCLUDED.name,
                 type = EXCLUDED.type,
                 currency = EXCLUDED.currency,
                 lot = EXCLUDED.lot,
                 is_active = EXCLUDED.is_active",
        )
        .bind(&instrument.figi)
        .bind(&instrument.ticker)
        .bind(&instrument.name)
        .bind(&instrument.instrument_type)
        .bind(instrument.currency.as_deref())
        .bind(instrument.lot)
        .bind(instrument.is_active)
        .execute(self.pool())
        .await
        .map_err(map_db_err)?;
        Ok(())
    }
}
