use crate::config::Config;
use crate::error::Error;
use clap::ValueEnum;
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::dataframe::DataFrameWriteOptions;
use datafusion::prelude::{CsvReadOptions, SessionContext};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

const STAGING_DIR: &str = ".staging";

/// What happens to rows already in the table when a report is loaded.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDisposition {
    Append,
    Truncate,
}

/// A single CSV bulk load into a warehouse table.
#[derive(Debug, Clone)]
pub struct LoadJob {
    pub table: String,
    pub schema: SchemaRef,
    pub source: PathBuf,
    /// Distinguishes this load's output from earlier loads into the same table.
    pub label: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Warehouse: Send + Sync + 'static {
    /// Loads a CSV file into its destination table.
    ///
    /// # Returns
    /// The number of rows loaded.
    async fn load_csv(&self, job: &LoadJob) -> Result<usize, Error>;
}

/// Columnar warehouse kept on disk: one directory of Parquet files per table.
pub struct ParquetWarehouse {
    dataset_dir: PathBuf,
    write_disposition: WriteDisposition,
}

impl ParquetWarehouse {
    pub fn new(config: &Config) -> Self {
        ParquetWarehouse {
            dataset_dir: Path::new(&config.warehouse_dir).join(&config.dataset),
            write_disposition: config.write_disposition,
        }
    }

    pub fn table_dir(&self, table: &str) -> PathBuf {
        self.dataset_dir.join(table)
    }

    fn prepare_table_dir(&self, table: &str) -> Result<PathBuf, Error> {
        let table_dir = self.table_dir(table);
        if self.write_disposition == WriteDisposition::Truncate && table_dir.exists() {
            info!("truncating table {}", table);
            fs::remove_dir_all(&table_dir)?;
        }
        fs::create_dir_all(&table_dir)?;
        Ok(table_dir)
    }
}

#[async_trait::async_trait]
impl Warehouse for ParquetWarehouse {
    async fn load_csv(&self, job: &LoadJob) -> Result<usize, Error> {
        let ctx = SessionContext::new();
        let source = job.source.to_string_lossy().into_owned();
        let extension = job
            .source
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let df = ctx
            .read_csv(
                source.as_str(),
                CsvReadOptions::new()
                    .schema(job.schema.as_ref())
                    .has_header(true)
                    .file_extension(&extension),
            )
            .await?;

        let rows = df.clone().count().await?;

        if rows == 0 {
            self.prepare_table_dir(&job.table)?;
            info!("{} is empty, nothing loaded into {}", source, job.table);
            return Ok(0);
        }

        // The table is only touched once the Parquet file is complete.
        let staging_dir = self.dataset_dir.join(STAGING_DIR).join(&job.table);
        fs::create_dir_all(&staging_dir)?;
        let file_name = format!("{}.parquet", job.label);
        let staged = staging_dir.join(&file_name);
        let written = df
            .write_parquet(
                &staged.to_string_lossy(),
                DataFrameWriteOptions::new().with_single_file_output(true),
                None,
            )
            .await;
        if let Err(e) = written {
            if staged.exists() {
                fs::remove_file(&staged)?;
            }
            return Err(e.into());
        }

        let path = self.prepare_table_dir(&job.table)?.join(file_name);
        fs::rename(&staged, &path)?;

        info!("loaded {} rows into {} ({})", rows, job.table, path.display());
        Ok(rows)
    }
}
