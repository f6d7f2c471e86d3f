//! Static directories of the supported publisher tables.
//!
//! The ABS directory maps catalogue numbers to the topic landing page
//! that carries the download links; the RBA directory maps table codes
//! straight to the spreadsheet URL.

/// Landing page listing every ABS time-series release.
pub const ABS_DIRECTORY_URL: &str =
    "https://www.abs.gov.au/about/data-services/help/abs-time-series-directory";

/// One ABS catalogue number and where it lives in the topic hierarchy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AbsCatalogueEntry {
    pub catalogue_id: &'static str,
    pub theme: &'static str,
    pub parent_topic: &'static str,
    pub topic: &'static str,
    pub url: &'static str,
    /// Release is no longer updated by the publisher.
    pub ceased: bool,
}

macro_rules! abs_entry {
    ($id:literal, $theme:literal, $parent:literal, $topic:literal) => {
        abs_entry!($id, $theme, $parent, $topic, false)
    };
    ($id:literal, $theme:literal, $parent:literal, $topic:literal, $ceased:literal) => {
        AbsCatalogueEntry {
            catalogue_id: $id,
            theme: $theme,
            parent_topic: $parent,
            topic: $topic,
            url: ABS_DIRECTORY_URL,
            ceased: $ceased,
        }
    };
}

const ABS_CATALOGUE: [AbsCatalogueEntry; 45] = [
    abs_entry!("1364.0.15.003", "Economy", "National Accounts", "Modellers Database"),
    abs_entry!("3101.0", "People", "Population", "National State And Territory Population"),
    abs_entry!("3222.0", "People", "Population", "Population Projections Australia"),
    abs_entry!("3401.0", "Industry", "Tourism And Transport", "Overseas Arrivals And Departures Australia"),
    abs_entry!("5204.0", "Economy", "National Accounts", "Australian System National Accounts"),
    abs_entry!("5206.0", "Economy", "National Accounts", "Australian National Accounts National Income Expenditure And Product"),
    abs_entry!("5220.0", "Economy", "National Accounts", "Australian National Accounts State Accounts"),
    abs_entry!("5232.0", "Economy", "National Accounts", "Australian National Accounts Finance And Wealth"),
    abs_entry!("5232.0.55.001", "Economy", "Finance", "Assets And Liabilities Australian Securitisers"),
    abs_entry!("5302.0", "Economy", "International Trade", "Balance Payments And International Investment Position Australia"),
    abs_entry!("5368.0", "Economy", "International Trade", "International Trade Goods And Services Australia"),
    abs_entry!("5368.0.55.024", "Economy", "International Trade", "International Merchandise Trade Preliminary Australia"),
    abs_entry!("5601.0", "Economy", "Finance", "Lending Indicators"),
    abs_entry!("5625.0", "Economy", "Business Indicators", "Private New Capital Expenditure And Expected Expenditure Australia"),
    abs_entry!("5655.0", "Economy", "Finance", "Managed Funds Australia"),
    abs_entry!("5676.0", "Economy", "Business Indicators", "Business Indicators Australia"),
    abs_entry!("5681.0", "Economy", "Business Indicators", "Monthly Business Turnover Indicator"),
    abs_entry!("5682.0", "Economy", "Finance", "Monthly Household Spending Indicator"),
    abs_entry!("6202.0", "Labour", "Employment And Unemployment", "Labour Force Australia"),
    abs_entry!("6150.0.55.003", "Labour", "Labour Accounts", "Labour Account Australia"),
    abs_entry!("6248.0.55.002", "Labour", "Employment And Unemployment", "Public Sector Employment And Earnings"),
    abs_entry!("6291.0.55.001", "Labour", "Employment And Unemployment", "Labour Force Australia Detailed"),
    abs_entry!("6302.0", "Labour", "Earnings And Working Conditions", "Average Weekly Earnings Australia"),
    abs_entry!("6321.0.55.001", "Labour", "Earnings And Working Conditions", "Industrial Disputes Australia"),
    abs_entry!("6345.0", "Economy", "Price Indexes And Inflation", "Wage Price Index Australia"),
    abs_entry!("6354.0", "Labour", "Jobs", "Job Vacancies Australia"),
    abs_entry!("6401.0", "Economy", "Price Indexes And Inflation", "Consumer Price Index Australia"),
    abs_entry!("6416.0", "Economy", "Price Indexes And Inflation", "Residential Property Price Indexes Eight Capital Cities", true),
    abs_entry!("6427.0", "Economy", "Price Indexes And Inflation", "Producer Price Indexes Australia"),
    abs_entry!("6432.0", "Economy", "Price Indexes And Inflation", "Total Value Dwellings"),
    abs_entry!("6457.0", "Economy", "Price Indexes And Inflation", "International Trade Price Indexes Australia"),
    abs_entry!("6467.0", "Economy", "Price Indexes And Inflation", "Selected Living Cost Indexes Australia"),
    abs_entry!("6484.0", "Economy", "Price Indexes And Inflation", "Monthly Consumer Price Index Indicator"),
    abs_entry!("7215.0", "Industry", "Agriculture", "Livestock Products Australia"),
    abs_entry!("7218.0.55.001", "Industry", "Agriculture", "Livestock And Meat Australia", true),
    abs_entry!("8155.0", "Industry", "Industry Overview", "Australian Industry"),
    abs_entry!("8165.0", "Economy", "Business Indicators", "Counts Australian Businesses Including Entries And Exits"),
    abs_entry!("8412.0", "Industry", "Mining", "Mineral And Petroleum Exploration Australia"),
    abs_entry!("8501.0", "Industry", "Retail And Wholesale Trade", "Retail Trade Australia"),
    abs_entry!("8701.0", "Industry", "Building And Construction", "Estimated Dwelling Stock"),
    abs_entry!("8731.0", "Industry", "Building And Construction", "Building Approvals Australia"),
    abs_entry!("8752.0", "Industry", "Building And Construction", "Building Activity Australia"),
    abs_entry!("8755.0", "Industry", "Building And Construction", "Construction Work Done Australia Preliminary"),
    abs_entry!("8762.0", "Industry", "Building And Construction", "Engineering Construction Activity Australia"),
    abs_entry!("8782.0.65.001", "Industry", "Building And Construction", "Construction Activity Chain Volume Measures Australia", true),
];

/// Every known ABS catalogue number, in catalogue order.
pub fn abs_catalogue() -> &'static [AbsCatalogueEntry] {
    &ABS_CATALOGUE
}

/// Looks up one ABS catalogue number.
pub fn abs_catalogue_entry(catalogue_id: &str) -> Option<&'static AbsCatalogueEntry> {
    ABS_CATALOGUE
        .iter()
        .find(|entry| entry.catalogue_id == catalogue_id)
}

/// One RBA statistical table and its spreadsheet URL.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RbaCatalogueEntry {
    pub table_code: &'static str,
    pub description: &'static str,
    pub url: &'static str,
}

macro_rules! rba_entry {
    ($code:literal, $description:literal, $file:literal) => {
        RbaCatalogueEntry {
            table_code: $code,
            description: $description,
            url: concat!("https://www.rba.gov.au/statistics/tables/xls/", $file),
        }
    };
}

// Extensions here record what the site advertises; the reader retries
// with the sibling extension when a download fails.
const RBA_CATALOGUE: [RbaCatalogueEntry; 16] = [
    rba_entry!("A1", "Reserve Bank Of Australia Balance Sheet", "a01hist.xls"),
    rba_entry!("A2", "Monetary Policy Changes", "a02hist.xls"),
    rba_entry!("A3", "Monetary Policy Operations Current", "a03hist.xlsx"),
    rba_entry!("B1", "Assets Of Financial Institutions", "b01hist.xls"),
    rba_entry!("D1", "Growth In Selected Financial Aggregates", "d01hist.xls"),
    rba_entry!("D2", "Lending And Credit Aggregates", "d02hist.xls"),
    rba_entry!("E1", "Household And Business Balance Sheets", "e01hist.xlsx"),
    rba_entry!("E2", "Household Finances Selected Ratios", "e02hist.xlsx"),
    rba_entry!("F1", "Interest Rates And Yields Money Market Daily", "f01d.xls"),
    rba_entry!("F2", "Capital Market Yields Government Bonds Daily", "f02d.xls"),
    rba_entry!("F4", "Advertised Deposit Rates", "f04hist.xls"),
    rba_entry!("F5", "Indicator Lending Rates", "f05hist.xls"),
    rba_entry!("F11", "Exchange Rates", "f11hist.xls"),
    rba_entry!("G1", "Consumer Price Inflation", "g01hist.xls"),
    rba_entry!("G3", "Inflation Expectations", "g03hist.xls"),
    rba_entry!("H1", "Gross Domestic Product And Income", "h01hist.xls"),
];

/// Every known RBA table, in table-code order.
pub fn rba_catalogue() -> &'static [RbaCatalogueEntry] {
    &RBA_CATALOGUE
}

/// Looks up one RBA table code.
pub fn rba_catalogue_entry(table_code: &str) -> Option<&'static RbaCatalogueEntry> {
    RBA_CATALOGUE
        .iter()
        .find(|entry| entry.table_code == table_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abs_catalogue_lookup() {
        let entry = abs_catalogue_entry("6202.0").unwrap();
        assert_eq!(entry.topic, "Labour Force Australia");
        assert_eq!(entry.url, ABS_DIRECTORY_URL);
        assert!(!entry.ceased);

        assert!(abs_catalogue_entry("6416.0").unwrap().ceased);
        assert!(abs_catalogue_entry("0000.0").is_none());
    }

    #[test]
    fn test_abs_catalogue_ids_are_unique() {
        for (position, entry) in abs_catalogue().iter().enumerate() {
            assert!(
                abs_catalogue()[..position]
                    .iter()
                    .all(|earlier| earlier.catalogue_id != entry.catalogue_id),
                "duplicate catalogue id {}",
                entry.catalogue_id
            );
        }
    }

    #[test]
    fn test_rba_catalogue_lookup() {
        let entry = rba_catalogue_entry("A2").unwrap();
        assert_eq!(
            entry.url,
            "https://www.rba.gov.au/statistics/tables/xls/a02hist.xls"
        );
        assert!(rba_catalogue_entry("XYZ").is_none());
        assert_eq!(rba_catalogue().len(), 16);
    }
}
