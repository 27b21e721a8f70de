use crate::data::{Column, ColumnType::*};
use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::Serialize;
use std::fmt;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportType {
    Campaign,
    AdGroup,
    Account,
    Ad,
    Asset,
    Audience,
    Conversion,
}

impl ReportType {
    pub const ALL: [ReportType; 7] = [
        ReportType::Campaign,
        ReportType::AdGroup,
        ReportType::Account,
        ReportType::Ad,
        ReportType::Asset,
        ReportType::Audience,
        ReportType::Conversion,
    ];

    /// Name of the polymorphic request type understood by the reporting service.
    pub fn request_type(&self) -> &'static str {
        match self {
            ReportType::Campaign => "CampaignPerformanceReportRequest",
            ReportType::AdGroup => "AdGroupPerformanceReportRequest",
            ReportType::Account => "AccountPerformanceReportRequest",
            ReportType::Ad => "AdPerformanceReportRequest",
            ReportType::Asset => "AssetPerformanceReportRequest",
            ReportType::Audience => "AudiencePerformanceReportRequest",
            ReportType::Conversion => "ConversionPerformanceReportRequest",
        }
    }

    /// Destination warehouse table.
    pub fn table(&self) -> &'static str {
        match self {
            ReportType::Campaign => "campaign_performance",
            ReportType::AdGroup => "ad_group_performance",
            ReportType::Account => "account_performance",
            ReportType::Ad => "ad_performance",
            ReportType::Asset => "asset_performance",
            ReportType::Audience => "audience_performance",
            ReportType::Conversion => "conversion_performance",
        }
    }

    pub fn columns(&self) -> &'static [Column] {
        match self {
            ReportType::Campaign => CAMPAIGN_COLUMNS,
            ReportType::AdGroup => AD_GROUP_COLUMNS,
            ReportType::Account => ACCOUNT_COLUMNS,
            ReportType::Ad => AD_COLUMNS,
            ReportType::Asset => ASSET_COLUMNS,
            ReportType::Audience => AUDIENCE_COLUMNS,
            ReportType::Conversion => CONVERSION_COLUMNS,
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

const CAMPAIGN_COLUMNS: &[Column] = &[
    Column::new("TimePeriod", Date32),
    Column::new("AccountId", Int64),
    Column::new("AccountName", Utf8),
    Column::new("CampaignId", Int64),
    Column::new("CampaignName", Utf8),
    Column::new("CampaignStatus", Utf8),
    Column::new("Impressions", Int64),
    Column::new("Clicks", Int64),
    Column::new("Ctr", Utf8),
    Column::new("AverageCpc", Float64),
    Column::new("Spend", Float64),
    Column::new("Conversions", Float64),
    Column::new("ConversionRate", Utf8),
    Column::new("Revenue", Float64),
    Column::new("CurrencyCode", Utf8),
];

const AD_GROUP_COLUMNS: &[Column] = &[
    Column::new("TimePeriod", Date32),
    Column::new("AccountId", Int64),
    Column::new("CampaignId", Int64),
    Column::new("CampaignName", Utf8),
    Column::new("AdGroupId", Int64),
    Column::new("AdGroupName", Utf8),
    Column::new("Status", Utf8),
    Column::new("Impressions", Int64),
    Column::new("Clicks", Int64),
    Column::new("Ctr", Utf8),
    Column::new("AverageCpc", Float64),
    Column::new("Spend", Float64),
    Column::new("Conversions", Float64),
    Column::new("Revenue", Float64),
];

const ACCOUNT_COLUMNS: &[Column] = &[
    Column::new("TimePeriod", Date32),
    Column::new("AccountId", Int64),
    Column::new("AccountName", Utf8),
    Column::new("AccountNumber", Utf8),
    Column::new("AccountStatus", Utf8),
    Column::new("Impressions", Int64),
    Column::new("Clicks", Int64),
    Column::new("Ctr", Utf8),
    Column::new("AverageCpc", Float64),
    Column::new("Spend", Float64),
    Column::new("Conversions", Float64),
    Column::new("Revenue", Float64),
    Column::new("CurrencyCode", Utf8),
];

const AD_COLUMNS: &[Column] = &[
    Column::new("TimePeriod", Date32),
    Column::new("AccountId", Int64),
    Column::new("CampaignId", Int64),
    Column::new("AdGroupId", Int64),
    Column::new("AdId", Int64),
    Column::new("AdTitle", Utf8),
    Column::new("AdType", Utf8),
    Column::new("AdStatus", Utf8),
    Column::new("FinalUrl", Utf8),
    Column::new("Impressions", Int64),
    Column::new("Clicks", Int64),
    Column::new("Ctr", Utf8),
    Column::new("Spend", Float64),
    Column::new("Conversions", Float64),
    Column::new("Revenue", Float64),
];

const ASSET_COLUMNS: &[Column] = &[
    Column::new("TimePeriod", Date32),
    Column::new("AccountId", Int64),
    Column::new("CampaignId", Int64),
    Column::new("AdGroupId", Int64),
    Column::new("AssetId", Int64),
    Column::new("AssetType", Utf8),
    Column::new("AssetContent", Utf8),
    Column::new("AssetSource", Utf8),
    Column::new("Impressions", Int64),
    Column::new("Clicks", Int64),
    Column::new("Ctr", Utf8),
    Column::new("Conversions", Float64),
    Column::new("Revenue", Float64),
];

const AUDIENCE_COLUMNS: &[Column] = &[
    Column::new("TimePeriod", Date32),
    Column::new("AccountId", Int64),
    Column::new("CampaignId", Int64),
    Column::new("AdGroupId", Int64),
    Column::new("AudienceId", Int64),
    Column::new("AudienceName", Utf8),
    Column::new("AudienceType", Utf8),
    Column::new("AssociationStatus", Utf8),
    Column::new("Impressions", Int64),
    Column::new("Clicks", Int64),
    Column::new("Ctr", Utf8),
    Column::new("Spend", Float64),
    Column::new("Conversions", Float64),
    Column::new("Revenue", Float64),
];

const CONVERSION_COLUMNS: &[Column] = &[
    Column::new("TimePeriod", Date32),
    Column::new("AccountId", Int64),
    Column::new("CampaignId", Int64),
    Column::new("AdGroupId", Int64),
    Column::new("KeywordId", Int64),
    Column::new("Keyword", Utf8),
    Column::new("Goal", Utf8),
    Column::new("GoalType", Utf8),
    Column::new("Impressions", Int64),
    Column::new("Clicks", Int64),
    Column::new("Assists", Int64),
    Column::new("Conversions", Float64),
    Column::new("Revenue", Float64),
];

/// Body of a `GenerateReport/Submit` call, one per report type.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ReportRequest {
    #[serde(rename = "Type")]
    pub request_type: &'static str,
    pub report_name: String,
    pub format: &'static str,
    pub format_version: &'static str,
    pub exclude_column_headers: bool,
    pub exclude_report_footer: bool,
    pub exclude_report_header: bool,
    pub return_only_complete_data: bool,
    pub aggregation: &'static str,
    pub columns: Vec<&'static str>,
    pub scope: ReportScope,
    pub time: ReportTime,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ReportScope {
    pub account_ids: Vec<i64>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ReportTime {
    pub custom_date_range_start: ReportDate,
    pub custom_date_range_end: ReportDate,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ReportDate {
    pub day: u32,
    pub month: u32,
    pub year: i32,
}

impl From<&NaiveDate> for ReportDate {
    fn from(date: &NaiveDate) -> Self {
        ReportDate {
            day: date.day(),
            month: date.month(),
            year: date.year(),
        }
    }
}

impl ReportRequest {
    pub fn new(report_type: ReportType, account_id: i64, start: &NaiveDate, end: &NaiveDate) -> Self {
        ReportRequest {
            request_type: report_type.request_type(),
            report_name: format!("{}_{}_{}", report_type.table(), start, end),
            format: "Csv",
            format_version: "2.0",
            exclude_column_headers: false,
            exclude_report_footer: true,
            exclude_report_header: true,
            return_only_complete_data: false,
            aggregation: "Daily",
            columns: report_type.columns().iter().map(|c| c.name).collect(),
            scope: ReportScope {
                account_ids: vec![account_id],
            },
            time: ReportTime {
                custom_date_range_start: start.into(),
                custom_date_range_end: end.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;
    use std::str::FromStr;

    #[test]
    fn test_report_request_body() {
        let start = NaiveDate::from_str("2024-01-01").unwrap();
        let end = NaiveDate::from_str("2024-01-31").unwrap();
        let request = ReportRequest::new(ReportType::Account, 222, &start, &end);
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["Type"], "AccountPerformanceReportRequest");
        assert_eq!(body["Format"], "Csv");
        assert_eq!(body["Aggregation"], "Daily");
        assert_eq!(body["ExcludeReportHeader"], true);
        assert_eq!(body["ExcludeReportFooter"], true);
        assert_eq!(body["ExcludeColumnHeaders"], false);
        assert_eq!(body["Scope"], json!({ "AccountIds": [222] }));
        assert_eq!(
            body["Time"],
            json!({
                "CustomDateRangeStart": { "Day": 1, "Month": 1, "Year": 2024 },
                "CustomDateRangeEnd": { "Day": 31, "Month": 1, "Year": 2024 },
            })
        );
        assert_eq!(
            body["Columns"].as_array().unwrap().len(),
            ReportType::Account.columns().len()
        );
    }

    #[test]
    fn test_every_report_has_its_own_table() {
        let tables: HashSet<_> = ReportType::ALL.iter().map(|r| r.table()).collect();
        assert_eq!(tables.len(), ReportType::ALL.len());
    }

    #[test]
    fn test_every_report_has_time_period_and_account() {
        for report_type in ReportType::ALL {
            let names: Vec<_> = report_type.columns().iter().map(|c| c.name).collect();
            assert!(names.contains(&"TimePeriod"), "{}", report_type);
            assert!(names.contains(&"AccountId"), "{}", report_type);
        }
    }
}
