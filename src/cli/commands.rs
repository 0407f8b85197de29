use colored::Colorize;
use rust_xlsxwriter::{Format, FormatAlign, Workbook};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ServeArgs;
use crate::error::{FormError, FormResult};
use crate::ingest::{IngestOptions, InputPolicy, TemplateParser};
use crate::org::OrgCatalog;
use crate::service::{TemplateService, Upload};
use crate::store::SqliteStore;
use crate::types::{ParseMode, ParsedTable, Template, TemplateKey};

fn xlsx_error(e: rust_xlsxwriter::XlsxError) -> FormError {
    FormError::Io(std::io::Error::other(format!("failed to write Excel file: {}", e)))
}

fn runtime() -> FormResult<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

fn open_service(
    db: &Path,
    org_catalog: Option<&Path>,
    policy: InputPolicy,
) -> FormResult<TemplateService> {
    let store = SqliteStore::open(db)?;
    let parser = TemplateParser::new(&IngestOptions {
        input_policy: policy,
        ..IngestOptions::default()
    });
    let mut service = TemplateService::new(Arc::new(store), parser);
    if let Some(path) = org_catalog {
        service = service.with_org(OrgCatalog::load(path)?);
    }
    Ok(service)
}

/// Execute the parse command
pub fn parse(file: PathBuf, json: bool, policy: InputPolicy) -> FormResult<()> {
    let parser = TemplateParser::new(&IngestOptions {
        input_policy: policy,
        ..IngestOptions::default()
    });
    let table = parser.parse_path(&file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    println!("{}", "📋 formreview - Parse".bold().green());
    println!("   File: {}\n", file.display());
    print_table(&table);
    Ok(())
}

fn print_table(table: &ParsedTable) {
    let meta = &table.meta;
    let mode = match meta.mode {
        ParseMode::Strict | ParseMode::Flexible => meta.mode.to_string().bright_green(),
        ParseMode::FullSheet => meta.mode.to_string().yellow(),
        ParseMode::Error => meta.mode.to_string().red(),
    };
    println!("   Mode:         {}", mode);
    if let Some(sheet) = &meta.sheet_name {
        println!("   Sheet:        {}", sheet);
    }
    if let Some(row) = meta.header_row {
        println!("   Header row:   {}", row + 1);
    }
    println!("   Input policy: {}", meta.input_policy);
    if let Some(message) = &meta.message {
        println!("   {}", message.red());
    }
    println!(
        "   {} columns, {} rows, {} input cells\n",
        table.headers.len(),
        table.rows.len(),
        table.input_cell_count()
    );

    if table.headers.is_empty() {
        return;
    }
    println!("   {}", table.headers.join(" | ").bold());
    for row in &table.rows {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| {
                let text = cell.value.as_text();
                if cell.is_input {
                    format!("[{}]", text).bright_yellow().to_string()
                } else {
                    text
                }
            })
            .collect();
        println!("   {}", cells.join(" | "));
    }
    println!();
}

/// Build the demo evaluation form: title rows, a merged two-row header,
/// italic labels on input rows, filled input cells and a closing `D` row.
pub fn sample_workbook() -> FormResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Phiếu đánh giá").map_err(xlsx_error)?;

    let title = Format::new().set_bold().set_align(FormatAlign::Center);
    let header = Format::new().set_bold().set_align(FormatAlign::Center);
    let italic = Format::new().set_italic();
    let input = Format::new().set_background_color(0xFFF2CC);

    worksheet.set_column_width(1, 36).map_err(xlsx_error)?;

    worksheet
        .merge_range(0, 0, 0, 5, "PHIẾU ĐÁNH GIÁ KẾT QUẢ CÔNG VIỆC", &title)
        .map_err(xlsx_error)?;
    worksheet
        .write_string(1, 0, "Kỳ đánh giá: Quý 3/2024")
        .map_err(xlsx_error)?;

    // Two-row header: STT / Chỉ tiêu / Điểm chuẩn / Ghi chú span both rows,
    // "Kết quả" spans Kế hoạch + Thực hiện.
    for (col, text) in [(0u16, "STT"), (1, "Chỉ tiêu"), (2, "Điểm chuẩn"), (5, "Ghi chú")] {
        worksheet
            .merge_range(3, col, 4, col, text, &header)
            .map_err(xlsx_error)?;
    }
    worksheet
        .merge_range(3, 3, 3, 4, "Kết quả", &header)
        .map_err(xlsx_error)?;
    worksheet
        .write_string_with_format(4, 3, "Kế hoạch", &header)
        .map_err(xlsx_error)?;
    worksheet
        .write_string_with_format(4, 4, "Thực hiện", &header)
        .map_err(xlsx_error)?;

    // (sequence, label, reference score, employee input row?)
    let rows: [(&str, &str, Option<f64>, bool); 6] = [
        ("", "A. Chỉ tiêu tài chính", None, false),
        ("1", "Doanh thu", Some(30.0), true),
        ("2", "Lợi nhuận", Some(20.0), true),
        ("3", "Tuân thủ quy trình", Some(10.0), false),
        ("", "", None, false),
        ("D", "Tổng điểm", Some(100.0), false),
    ];
    let mut row = 5u32;
    for (sequence, label, score, is_input) in rows {
        if !sequence.is_empty() {
            worksheet.write_string(row, 0, sequence).map_err(xlsx_error)?;
        }
        if !label.is_empty() {
            if is_input {
                worksheet
                    .write_string_with_format(row, 1, label, &italic)
                    .map_err(xlsx_error)?;
            } else {
                worksheet.write_string(row, 1, label).map_err(xlsx_error)?;
            }
        }
        if let Some(score) = score {
            worksheet.write_number(row, 2, score).map_err(xlsx_error)?;
        }
        if is_input {
            worksheet.write_blank(row, 3, &input).map_err(xlsx_error)?;
            worksheet.write_blank(row, 4, &input).map_err(xlsx_error)?;
        }
        row += 1;
    }
    worksheet
        .write_string(row + 1, 1, "Người đánh giá ký tên")
        .map_err(xlsx_error)?;

    workbook.save_to_buffer().map_err(xlsx_error)
}

/// Execute the sample command
pub fn sample(output: PathBuf) -> FormResult<()> {
    let bytes = sample_workbook()?;
    std::fs::write(&output, bytes)?;

    println!("{}", "✅ Sample form written".bold().green());
    println!("   File: {}", output.display());
    println!("   Try:  formreview parse {}\n", output.display());
    Ok(())
}

/// Execute the import command
pub fn import(
    file: PathBuf,
    db: PathBuf,
    keys: Vec<String>,
    org_catalog: Option<PathBuf>,
    policy: InputPolicy,
) -> FormResult<()> {
    println!("{}", "📋 formreview - Import".bold().green());
    println!("   File:     {}", file.display());
    println!("   Database: {}\n", db.display());

    let keys = keys
        .iter()
        .map(|k| TemplateKey::parse(k))
        .collect::<FormResult<Vec<_>>>()?;
    let service = open_service(&db, org_catalog.as_deref(), policy)?;
    let upload = Upload::from_path(&file)?;

    let rt = runtime()?;
    match keys.as_slice() {
        [] => Err(FormError::MissingRequiredField("--key".to_string())),
        [key] => {
            let template = rt.block_on(service.import_one(key.clone(), upload))?;
            println!("{}", "✅ Import Complete!".bold().green());
            print_template_line(&template, service.org());
            Ok(())
        }
        _ => {
            let count = rt.block_on(service.import_bulk(keys.clone(), upload))?;
            println!("{}", "✅ Import Complete!".bold().green());
            for key in &keys {
                println!("   {}", key.to_string().bright_blue());
            }
            println!("   {} templates written\n", count);
            Ok(())
        }
    }
}

fn print_template_line(template: &Template, org: Option<&OrgCatalog>) {
    let label = match (org, TemplateKey::parse(&template.key)) {
        (Some(org), Ok(key)) => format!("  ({})", org.label(&key)),
        _ => String::new(),
    };
    println!(
        "   {}{}  {} rows  updated {}",
        template.key.bright_blue(),
        label,
        template.rows.len(),
        template.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
}

/// Execute the list command
pub fn list(db: PathBuf) -> FormResult<()> {
    let service = open_service(&db, None, InputPolicy::default())?;
    let templates = runtime()?.block_on(service.list())?;

    println!("{}", "📋 formreview - Templates".bold().green());
    println!("   Database: {}\n", db.display());
    if templates.is_empty() {
        println!("   {}", "No templates stored".yellow());
    }
    for template in &templates {
        print_template_line(template, None);
    }
    println!();
    Ok(())
}

/// Execute the show command
pub fn show(key: String, db: PathBuf, json: bool) -> FormResult<()> {
    let service = open_service(&db, None, InputPolicy::default())?;
    let template = runtime()?.block_on(service.get(&key))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&template)?);
        return Ok(());
    }

    println!("{}", "📋 formreview - Template".bold().green());
    print_template_line(&template, None);
    if let Some(source) = &template.source_file {
        println!("   Source: {}", source);
    }
    println!();
    println!("   {}", template.headers.join(" | ").bold());
    for row in &template.rows {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| {
                if cell.is_input {
                    format!("[{}]", cell.value.as_text()).bright_yellow().to_string()
                } else {
                    cell.value.as_text()
                }
            })
            .collect();
        println!("   {}", cells.join(" | "));
    }
    println!();
    Ok(())
}

/// Execute the remove command
pub fn remove(key: String, db: PathBuf) -> FormResult<()> {
    let service = open_service(&db, None, InputPolicy::default())?;
    runtime()?.block_on(service.remove(&key))?;
    println!("{} {}", "🗑️  Removed".bold().green(), key.bright_blue());
    Ok(())
}

/// Execute the serve command
pub fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = args.into_config();
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(crate::api::run_api_server(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellValue;

    #[test]
    fn test_sample_workbook_parses_strict_with_italic_inputs() {
        let bytes = sample_workbook().unwrap();
        let table = TemplateParser::default().parse_bytes(&bytes).unwrap();

        assert_eq!(table.meta.mode, ParseMode::Strict);
        assert_eq!(table.meta.header_row, Some(4));
        assert_eq!(
            table.headers,
            vec!["STT", "Chỉ tiêu", "Điểm chuẩn", "Kế hoạch", "Thực hiện", "Ghi chú"]
        );

        let sequences: Vec<String> = table.rows.iter().map(|r| r[0].value.as_text()).collect();
        assert_eq!(sequences, vec!["1", "2", "3", "D"]);
        assert_eq!(table.rows[3][2].value, CellValue::Number(100.0));

        let inputs: Vec<Vec<bool>> = table
            .rows
            .iter()
            .map(|r| r.iter().map(|c| c.is_input).collect())
            .collect();
        let marked = vec![false, false, false, true, true, false];
        assert_eq!(inputs[0], marked);
        assert_eq!(inputs[1], marked);
        assert_eq!(inputs[2], vec![false; 6]);
    }

    #[test]
    fn test_sample_workbook_fill_policy_agrees() {
        let bytes = sample_workbook().unwrap();
        let parser = TemplateParser::new(&IngestOptions {
            input_policy: InputPolicy::FillColor {
                restrict_to_planned_actual: false,
            },
            ..IngestOptions::default()
        });
        let table = parser.parse_bytes(&bytes).unwrap();
        assert_eq!(table.input_cell_count(), 4);
        assert!(table.rows[0][3].is_input);
        assert!(!table.rows[0][1].is_input);
    }
}
