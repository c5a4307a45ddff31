use chrono::{Duration, NaiveDate};
use trendpull::{read_manifest, Credentials, NaMode, Staging, TrendPull, TrendPullError};

#[tokio::main]
async fn main() -> Result<(), TrendPullError> {
    let sensors = read_manifest()
        .path("log_maps/Log_map_TMV23.csv")
        .call()
        .await?;
    println!("{} sensors in manifest", sensors.len());

    let client = TrendPull::builder()
        .credentials(Credentials::from_env()?)
        .build()?;

    let report = client
        .extract()
        .sensors(sensors)
        .start(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap())
        .end(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap().and_hms_opt(0, 0, 0).unwrap())
        .window(Duration::hours(10))
        .concurrency(8)
        .na_mode(NaMode::All)
        .staging(Staging::Disk)
        .output_path("SAVED_LOGS/TMV23_2024_01.csv")
        .call()
        .await?;

    println!(
        "Wrote {:?}: {} rows x {} sensors, {}/{} windows ok",
        report.output_path,
        report.rows,
        report.columns,
        report.windows_staged + report.windows_empty,
        report.windows_planned
    );

    Ok(())
}
