//! HR operations.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use erpmind_common::{error_result, Department, FnOperation, OperationCatalog, ParamSpec, ParamType};

use crate::data::{days, first_of_month, last_of_month, Employee, EmployeeStatus, ErpData};
use crate::format::{fallback, table, typed};
use crate::read::{date_or, non_empty, opt_text, text_or, to_result};

const LEAVE_TYPES: [&str; 3] = ["Vacation", "Sick", "Personal"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveEntry {
    pub employee: String,
    pub department: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractStatus {
    pub employee_name: String,
    pub employee_id: String,
    pub contract_end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "report_type", rename_all = "snake_case")]
pub enum HrReport {
    Headcount {
        headcount: usize,
        by_department: BTreeMap<String, usize>,
    },
    Turnover {
        employees: usize,
        terminated: usize,
        turnover_rate: f64,
    },
}

/// Inclusive date range for `this week`, `next week`, otherwise this month.
fn leave_window(period: &str, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = today - days(today.weekday().num_days_from_monday() as i64);
    match period.trim().to_lowercase().as_str() {
        "this week" => (monday, monday + days(6)),
        "next week" => (monday + days(7), monday + days(13)),
        _ => (first_of_month(today), last_of_month(today)),
    }
}

pub(crate) fn register(catalog: &mut OperationCatalog, data: &Arc<ErpData>) {
    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "get_leave_calendar",
        Department::Hr,
        "Scheduled leave for this week, next week or this month.",
        vec![ParamSpec::optional("period", ParamType::String, "this week")],
        move |args| {
            let period = text_or(args, "period", "this week")?;
            let (start, end) = leave_window(&period, d.today());
            let span = (end - start).num_days();
            let entries: Vec<LeaveEntry> = d
                .figures
                .sample(&d.employees.active(), 5)
                .into_iter()
                .map(|e| {
                    let from = start + days(d.figures.between(0, span));
                    let to = (from + days(d.figures.between(0, 4))).min(end);
                    LeaveEntry {
                        employee: e.name,
                        department: e.department,
                        from_date: from,
                        to_date: to,
                        kind: d.figures.pick(&LEAVE_TYPES).to_string(),
                    }
                })
                .collect();
            to_result(&entries)
        },
        |value| match typed::<Vec<LeaveEntry>>(value) {
            Some(entries) if entries.is_empty() => "### 📅 Leave Calendar\n\nNo leave scheduled".to_string(),
            Some(entries) => format!(
                "### 📅 Leave Calendar\n\n{}",
                table(
                    &[
                        ("Employee", ":---------"),
                        ("Dept", ":-----"),
                        ("From", ":-----"),
                        ("To", ":---"),
                        ("Type", ":-----"),
                    ],
                    entries.iter().map(|e| {
                        vec![
                            e.employee.clone(),
                            e.department.clone(),
                            e.from_date.to_string(),
                            e.to_date.to_string(),
                            e.kind.clone(),
                        ]
                    }),
                )
            ),
            None => fallback(value),
        },
    )));

    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "add_employee",
        Department::Hr,
        "Add a new employee.",
        vec![
            ParamSpec::required("name", ParamType::String),
            ParamSpec::required("position", ParamType::String),
            ParamSpec::required("department", ParamType::String),
            ParamSpec::optional("start_date", ParamType::String, Value::Null),
        ],
        move |args| {
            let name = non_empty(args, "name")?;
            let position = non_empty(args, "position")?;
            let department = non_empty(args, "department")?;
            let start = date_or(args, "start_date", d.today())?;
            to_result(&d.employees.add(&name, &position, &department, start))
        },
        |value| match typed::<Employee>(value) {
            Some(e) => format!(
                "✅ **Employee Added**\n\n- **ID:** {}\n- **Name:** {}\n- **Dept:** {}\n- **Role:** {}\n- **Start Date:** {}",
                e.id, e.name, e.department, e.position, e.hire_date
            ),
            None => fallback(value),
        },
    )));

    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "check_contract_status",
        Department::Hr,
        "Contract end date for an employee.",
        vec![ParamSpec::required("employee_name", ParamType::String)],
        move |args| {
            let name = non_empty(args, "employee_name")?;
            let Some(employee) = d.employees.find(&name) else {
                return Ok(error_result(format!("No employee named {name}")));
            };
            to_result(&ContractStatus {
                employee_name: employee.name,
                employee_id: employee.id,
                contract_end_date: d.today() + days(d.figures.between(30, 365)),
            })
        },
        |value| match typed::<ContractStatus>(value) {
            Some(c) => format!(
                "📝 **Contract End Date** for {} ({}):\n\n- {}",
                c.employee_name, c.employee_id, c.contract_end_date
            ),
            None => fallback(value),
        },
    )));

    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "generate_hr_report",
        Department::Hr,
        "HR report: headcount or turnover.",
        vec![ParamSpec::optional("report_type", ParamType::String, "headcount")],
        move |args| {
            let report_type = text_or(args, "report_type", "headcount")?;
            let employees = d.employees.all();
            let report = match report_type.to_lowercase().as_str() {
                "headcount" => {
                    let mut by_department = BTreeMap::new();
                    for e in employees.iter().filter(|e| e.status != EmployeeStatus::Terminated) {
                        *by_department.entry(e.department.clone()).or_insert(0) += 1;
                    }
                    HrReport::Headcount {
                        headcount: by_department.values().sum(),
                        by_department,
                    }
                }
                "turnover" => {
                    let terminated = employees
                        .iter()
                        .filter(|e| e.status == EmployeeStatus::Terminated)
                        .count();
                    let rate = if employees.is_empty() {
                        0.0
                    } else {
                        terminated as f64 / employees.len() as f64
                    };
                    HrReport::Turnover {
                        employees: employees.len(),
                        terminated,
                        turnover_rate: (rate * 100.0).round() / 100.0,
                    }
                }
                other => {
                    return Ok(error_result(format!(
                        "Unknown report type '{other}'. Available: headcount, turnover"
                    )))
                }
            };
            to_result(&report)
        },
        |value| match typed::<HrReport>(value) {
            Some(HrReport::Headcount {
                headcount,
                by_department,
            }) => {
                let lines: Vec<String> = by_department
                    .iter()
                    .map(|(dept, n)| format!("- **{dept}**: {n}"))
                    .collect();
                format!(
                    "### 📃 HR Report\n\n- **Headcount**: {headcount}\n{}",
                    lines.join("\n")
                )
            }
            Some(HrReport::Turnover {
                employees,
                terminated,
                turnover_rate,
            }) => format!(
                "### 📃 HR Report\n\n- **Employees**: {employees}\n- **Terminated**: {terminated}\n- **Turnover Rate**: {turnover_rate:.2}"
            ),
            None => fallback(value),
        },
    )));

    let d = Arc::clone(data);
    catalog.register(Arc::new(FnOperation::new(
        "list_employees",
        Department::Hr,
        "Employees, optionally those who joined in a month (May, 2025-05) or year.",
        vec![ParamSpec::optional("joined_month", ParamType::String, Value::Null)],
        move |args| {
            let joined = opt_text(args, "joined_month")?;
            to_result(&d.employees.joined(joined.as_deref()))
        },
        |value| match typed::<Vec<Employee>>(value) {
            Some(list) if list.is_empty() => "### 👥 Employees\n\nNo employees found".to_string(),
            Some(list) => format!(
                "### 👥 Employees\n\n{}",
                table(
                    &[
                        ("Name", ":-----"),
                        ("Department", ":-----------"),
                        ("Position", ":---------"),
                        ("Hire Date", ":----------"),
                        ("Status", ":-------"),
                    ],
                    list.iter().map(|e| {
                        vec![
                            e.name.clone(),
                            e.department.clone(),
                            e.position.clone(),
                            e.hire_date.to_string(),
                            e.status.as_str().to_string(),
                        ]
                    }),
                )
            ),
            None => fallback(value),
        },
    )));
}
