use std::str::FromStr;

use chrono::NaiveDate;
use num_traits::PrimInt;
use regex::Regex;

#[inline]
pub fn parse_positive_int<T: PrimInt + FromStr>(int_str: &str) -> Option<T> {
    int_str.trim().parse::<T>().ok().filter(|i| !i.is_zero())
}

#[inline]
pub fn digit_vec(int_str: &str) -> Vec<u8> {
    int_str
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|u| u as u8)
        .collect()
}

/// Master files carry dates as MM/DD/YYYY; an unparseable or empty field
/// reads as missing data.
#[inline]
pub fn parse_american_date(date_str: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), "%m/%d/%Y").ok()
}

#[inline]
pub fn regex_split<'a>(s: &'a str, re: &Regex) -> (&'a str, Option<&'a str>) {
    match re.find(s) {
        None => (s, None),
        Some(m) => (&s[..m.start()], Some(&s[m.start()..])),
    }
}
