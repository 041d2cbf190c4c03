use std::io::Write;
use std::path::Path;

use serde_json::{Value, json};

/// Record that sits inside both the strict and the advisory bounds.
pub fn documented_record() -> Value {
    json!({
        "Account_Length": 120,
        "Area_Code": 415,
        "Intl_Plan": 0,
        "Vmail_Plan": 1,
        "Vmail_Message": 30,
        "CustServ_Calls": 3,
        "Total_Calls": 500,
        "Total_Mins": 1000,
        "Total_Charge": 200,
        "High_Usage": 0,
        "Many_CustServ_Calls": 0
    })
}

/// Two valid records; the second is a heavy customer-service caller.
pub fn documented_batch() -> Value {
    let mut second = documented_record();
    second["Account_Length"] = json!(45);
    second["Intl_Plan"] = json!(1);
    second["CustServ_Calls"] = json!(9);
    second["Many_CustServ_Calls"] = json!(1);
    json!({ "batch": [documented_record(), second] })
}

/// Columns of the raw churn export, in spreadsheet order.
pub const RAW_COLUMNS: [&str; 21] = [
    "State",
    "Account_Length",
    "Area_Code",
    "Phone",
    "Intl_Plan",
    "Vmail_Plan",
    "Vmail_Message",
    "Day_Mins",
    "Day_Calls",
    "Day_Charge",
    "Eve_Mins",
    "Eve_Calls",
    "Eve_Charge",
    "Night_Mins",
    "Night_Calls",
    "Night_Charge",
    "Intl_Mins",
    "Intl_Calls",
    "Intl_Charge",
    "CustServ_Calls",
    "Churn",
];

/// Synthetic raw churn rows.
///
/// Roughly one row in seven churns; churners make 4 to 9 customer-service
/// calls and everyone else makes at most 2, so a shallow tree separates them.
/// Every 50th row lacks a column and is dropped by preprocessing.
pub fn churn_rows(rows: usize) -> Vec<Value> {
    (0..rows)
        .map(|i| {
            let churned = i % 7 == 0;
            let calls = if churned { 4 + i % 6 } else { i % 3 };
            let area_code = [408, 415, 510][i % 3];
            let intl_plan = if i % 9 == 0 { "yes" } else { "no" };
            let vmail_plan = if i % 2 == 0 { "yes" } else { "no" };
            let vmail_message = if i % 2 == 0 { 20 + i % 15 } else { 0 };
            let label = if churned { "True." } else { "False." };
            let mut row = json!({
                "State": "KS",
                "Account_Length": 30 + i % 180,
                "Area_Code": area_code,
                "Phone": format!("382-{:04}", i),
                "Intl_Plan": intl_plan,
                "Vmail_Plan": vmail_plan,
                "Vmail_Message": vmail_message,
                "Day_Mins": 150.0 + (i % 120) as f64,
                "Day_Calls": 80 + i % 40,
                "Day_Charge": 25.5 + (i % 20) as f64,
                "Eve_Mins": 180.0 + (i % 60) as f64,
                "Eve_Calls": 90 + i % 25,
                "Eve_Charge": 15.0 + (i % 10) as f64,
                "Night_Mins": 200.0 + (i % 50) as f64,
                "Night_Calls": 95 + i % 20,
                "Night_Charge": 9.0 + (i % 5) as f64,
                "Intl_Mins": 10.0,
                "Intl_Calls": 3 + i % 4,
                "Intl_Charge": 2.7,
                "CustServ_Calls": calls,
                "Churn": label
            });
            if i % 50 == 49 {
                row.as_object_mut().unwrap().remove("Eve_Calls");
            }
            row
        })
        .collect()
}

/// Write [`churn_rows`] as JSON Lines, with a blank line every 40 rows.
pub fn write_churn_jsonl(path: &Path, rows: usize) {
    let mut file = std::fs::File::create(path).unwrap();
    for (i, row) in churn_rows(rows).iter().enumerate() {
        writeln!(file, "{row}").unwrap();
        if i % 40 == 0 {
            writeln!(file).unwrap();
        }
    }
}

/// Write [`churn_rows`] as CSV; missing columns become empty fields.
pub fn write_churn_csv(path: &Path, rows: usize) {
    let mut writer = csv::Writer::from_path(path).unwrap();
    writer.write_record(RAW_COLUMNS).unwrap();
    for row in churn_rows(rows) {
        let fields = RAW_COLUMNS.map(|column| match &row[column] {
            Value::Null => String::new(),
            Value::String(text) => text.clone(),
            other => other.to_string(),
        });
        writer.write_record(&fields).unwrap();
    }
    writer.flush().unwrap();
}
