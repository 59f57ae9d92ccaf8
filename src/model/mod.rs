//! Types that represent the data moving through a sync: worksheet and PROMS tables, the division
//! reference list and calendar dates.
mod date;
mod division;
mod table;

pub(crate) use date::{parse_date, DateRange};
pub(crate) use division::{Division, Divisions};
pub(crate) use table::{cell_text, is_null, is_zero, Row, Table};
