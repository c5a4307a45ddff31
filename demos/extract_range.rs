use chrono::NaiveDate;
use trendpull::{Credentials, SensorSpec, TrendPull, TrendPullError};
use std::env;

#[tokio::main]
async fn main() -> Result<(), TrendPullError> {
    configure_polars_display();
    let client = TrendPull::builder()
        .credentials(Credentials::from_env()?)
        .build()?;

    let sensors = vec![
        SensorSpec::new("TMV23/1-2.602", "RT101"),
        SensorSpec::new("TMV23/1-2.604", "RT101"),
    ];

    let report = client
        .extract()
        .sensors(sensors)
        .start(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(4, 0, 0).unwrap())
        .end(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(4, 0, 0).unwrap())
        .call()
        .await?;

    println!(
        "{} rows x {} sensors ({} windows staged, {} empty, {} failed)",
        report.rows,
        report.columns,
        report.windows_staged,
        report.windows_empty,
        report.windows_failed
    );
    println!("{:#?}", report.frame);

    Ok(())
}

fn configure_polars_display() {
    // show every column
    env::set_var("POLARS_FMT_MAX_COLS", "-1");
    // show 20 rows
    env::set_var("POLARS_FMT_MAX_ROWS", "20");
}
