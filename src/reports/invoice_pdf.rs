//! Printable invoice document.

use chrono::NaiveDate;
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point, Rgb,
};
use rust_decimal::Decimal;
use std::borrow::Cow;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::{
    config::AppConfig, entities::invoice::InvoiceStatus, errors::ServiceError,
    services::invoices::InvoiceDetail,
};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_LEFT: f32 = 15.0;
const MARGIN_RIGHT: f32 = 195.0;
const TOP: f32 = 280.0;
const BOTTOM: f32 = 40.0;

const COL_TASK: f32 = 15.0;
const COL_DESCRIPTION: f32 = 65.0;
const COL_PRICE: f32 = 165.0;
const DESCRIPTION_WIDTH: usize = 48;

/// Characters the builtin fonts can show beyond ASCII and Latin-1.
const WIN_ANSI_EXTRA: &str = "€‚ƒ„…†‡ˆ‰Š‹ŒŽ‘’“”•–—˜™š›œžŸ";

/// Document options taken from the application config.
#[derive(Debug, Clone, Default)]
pub struct PdfSettings {
    pub currency_label: String,
    /// TrueType font embedded for body text. Without one the builtin
    /// Helvetica is used and non-WinAnsi characters print as `?`.
    pub font_path: Option<PathBuf>,
    /// Bold face; falls back to `font_path`
    pub bold_font_path: Option<PathBuf>,
}

impl From<&AppConfig> for PdfSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            currency_label: cfg.currency_label.clone(),
            font_path: cfg.pdf_font_path.as_ref().map(PathBuf::from),
            bold_font_path: cfg.pdf_bold_font_path.as_ref().map(PathBuf::from),
        }
    }
}

/// Renders the invoice, its payments and remaining balance to PDF bytes.
pub fn render_invoice_pdf(
    detail: &InvoiceDetail,
    settings: &PdfSettings,
) -> Result<Vec<u8>, ServiceError> {
    let invoice = &detail.invoice;
    let currency_label = settings.currency_label.as_str();
    let title = format!("Invoice {}", invoice.invoice_number);
    let mut page = PageWriter::new(&title, settings)?;

    if invoice.status == InvoiceStatus::Paid {
        page.watermark("PAID");
    }

    page.bold("INVOICE", 24.0, MARGIN_LEFT);
    page.down(9.0);
    page.bold(&invoice.invoice_number, 12.0, MARGIN_LEFT);
    page.text(
        &format!("Status: {}", status_label(invoice.status)),
        10.0,
        COL_PRICE - 20.0,
    );
    page.down(8.0);
    page.rule();

    page.down(10.0);
    page.bold("Bill To:", 12.0, MARGIN_LEFT);
    page.text(
        &format!("Invoice date: {}", long_date(invoice.invoice_date)),
        10.0,
        COL_PRICE - 45.0,
    );
    page.down(6.0);
    page.text(&invoice.customer_name, 10.0, MARGIN_LEFT);
    page.text(
        &format!("Due date: {}", long_date(invoice.due_date)),
        10.0,
        COL_PRICE - 45.0,
    );
    page.down(5.0);
    page.text(&invoice.customer_email, 10.0, MARGIN_LEFT);
    if let Some(address) = &invoice.customer_address {
        for line in address.lines().filter(|l| !l.trim().is_empty()) {
            page.down(5.0);
            page.text(line.trim(), 10.0, MARGIN_LEFT);
        }
    }

    page.down(14.0);
    page.bold("Task", 10.0, COL_TASK);
    page.bold("Description", 10.0, COL_DESCRIPTION);
    page.bold("Price", 10.0, COL_PRICE);
    page.down(3.5);
    page.rule();
    page.down(6.0);

    if invoice.items.is_empty() {
        page.text("No items", 10.0, COL_DESCRIPTION);
        page.down(6.0);
    }
    for item in &invoice.items {
        let task = item.task_name.as_deref().unwrap_or("-");
        let lines = wrap(&strip_html(&item.description), DESCRIPTION_WIDTH);

        page.text(&truncate(task, 24), 10.0, COL_TASK);
        page.text(&amount(item.price, currency_label), 10.0, COL_PRICE);
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                page.down(5.0);
            }
            page.text(line, 10.0, COL_DESCRIPTION);
        }
        if let Some(discount) = item.discount.filter(|d| !d.is_zero()) {
            page.down(5.0);
            page.text(&format!("Discount {}%", discount.normalize()), 9.0, COL_DESCRIPTION);
        }
        page.down(7.0);
    }

    page.rule();
    page.down(8.0);
    page.total_row("Subtotal:", &amount(invoice.subtotal, currency_label), false);
    page.total_row("Tax:", &amount(invoice.tax, currency_label), false);
    page.total_row("Total:", &amount(invoice.total, currency_label), true);

    if !detail.payments.is_empty() {
        page.down(8.0);
        page.bold("Payments", 12.0, MARGIN_LEFT);
        page.down(6.0);
        for payment in &detail.payments {
            let method = payment.payment_method.map(|m| m.label()).unwrap_or("-");
            page.text(&long_date(payment.payment_date), 10.0, MARGIN_LEFT);
            page.text(method, 10.0, COL_DESCRIPTION);
            page.text(&amount(payment.amount, currency_label), 10.0, COL_PRICE);
            page.down(5.0);
        }
        page.down(3.0);
        page.total_row("Total paid:", &amount(detail.total_paid, currency_label), false);
    }
    page.total_row(
        "Remaining:",
        &amount(detail.remaining_amount, currency_label),
        true,
    );

    if let Some(notes) = invoice.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        page.down(8.0);
        page.bold("Notes:", 11.0, MARGIN_LEFT);
        for line in notes.lines().flat_map(|l| wrap(&strip_html(l), 90)) {
            page.down(5.0);
            page.text(&line, 10.0, MARGIN_LEFT);
        }
    }

    page.finish()
}

/// Cursor over the pages of a document being written top to bottom.
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    bold: IndirectFontRef,
    /// Embedded fonts take any character; builtin ones only WinAnsi
    embedded: bool,
    y: f32,
}

impl PageWriter {
    fn new(title: &str, settings: &PdfSettings) -> Result<Self, ServiceError> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);

        let (font, bold, embedded) = match &settings.font_path {
            Some(regular) => {
                let bold_path = settings.bold_font_path.as_deref().unwrap_or(regular.as_path());
                (
                    external_font(&doc, regular)?,
                    external_font(&doc, bold_path)?,
                    true,
                )
            }
            None => (
                doc.add_builtin_font(BuiltinFont::Helvetica)
                    .map_err(pdf_error)?,
                doc.add_builtin_font(BuiltinFont::HelveticaBold)
                    .map_err(pdf_error)?,
                false,
            ),
        };

        Ok(Self {
            doc,
            layer,
            font,
            bold,
            embedded,
            y: TOP,
        })
    }

    fn printable<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if self.embedded {
            Cow::Borrowed(text)
        } else {
            win_ansi(text)
        }
    }

    fn text(&self, text: &str, size: f32, x: f32) {
        self.layer
            .use_text(self.printable(text), size, Mm(x), Mm(self.y), &self.font);
    }

    fn bold(&self, text: &str, size: f32, x: f32) {
        self.layer
            .use_text(self.printable(text), size, Mm(x), Mm(self.y), &self.bold);
    }

    fn total_row(&mut self, label: &str, value: &str, strong: bool) {
        if strong {
            self.bold(label, 11.0, COL_PRICE - 35.0);
            self.bold(value, 11.0, COL_PRICE);
        } else {
            self.text(label, 10.0, COL_PRICE - 35.0);
            self.text(value, 10.0, COL_PRICE);
        }
        self.down(6.0);
    }

    fn rule(&self) {
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(MARGIN_LEFT), Mm(self.y)), false),
                (Point::new(Mm(MARGIN_RIGHT), Mm(self.y)), false),
            ],
            is_closed: false,
        });
    }

    fn watermark(&self, text: &str) {
        self.layer
            .set_fill_color(Color::Rgb(Rgb::new(0.80, 0.92, 0.80, None)));
        self.layer
            .use_text(text, 96.0, Mm(45.0), Mm(140.0), &self.bold);
        self.layer
            .set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
    }

    /// Moves the cursor down, starting a fresh page below the bottom margin.
    fn down(&mut self, by: f32) {
        self.y -= by;
        if self.y < BOTTOM {
            let (page, layer) = self
                .doc
                .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = TOP;
        }
    }

    fn finish(self) -> Result<Vec<u8>, ServiceError> {
        let mut writer = BufWriter::new(Vec::<u8>::new());
        self.doc.save(&mut writer).map_err(pdf_error)?;
        writer
            .into_inner()
            .map_err(|e| ServiceError::InternalError(format!("pdf buffer: {}", e)))
    }
}

fn external_font(doc: &PdfDocumentReference, path: &Path) -> Result<IndirectFontRef, ServiceError> {
    let file = File::open(path).map_err(|e| {
        ServiceError::InternalError(format!("pdf font {}: {}", path.display(), e))
    })?;
    doc.add_external_font(file).map_err(pdf_error)
}

/// Replaces characters the builtin fonts cannot encode with `?`.
fn win_ansi(text: &str) -> Cow<'_, str> {
    let encodable =
        |c: char| c.is_ascii() || ('\u{a0}'..='\u{ff}').contains(&c) || WIN_ANSI_EXTRA.contains(c);
    if text.chars().all(encodable) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|c| if encodable(c) { c } else { '?' })
            .collect(),
    )
}

fn pdf_error(err: impl std::fmt::Display) -> ServiceError {
    ServiceError::InternalError(format!("pdf rendering failed: {}", err))
}

fn status_label(status: InvoiceStatus) -> &'static str {
    match status {
        InvoiceStatus::Draft => "Draft",
        InvoiceStatus::Sent => "Sent",
        InvoiceStatus::Paid => "Paid",
        InvoiceStatus::PartiallyPaid => "Partially Paid",
        InvoiceStatus::Overdue => "Overdue",
    }
}

/// `Mar 05, 2024`
fn long_date(date: NaiveDate) -> String {
    date.format("%b %d, %Y").to_string()
}

fn amount(value: Decimal, currency_label: &str) -> String {
    format!("{} {:.2}", currency_label, value)
}

/// Drops markup tags and decodes the common entities.
pub(crate) fn strip_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }

    let decoded = out
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        invoice::LineItem,
        payment::{self, PaymentMethod},
    };
    use crate::services::invoices::InvoiceView;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn settings(currency_label: &str) -> PdfSettings {
        PdfSettings {
            currency_label: currency_label.into(),
            ..Default::default()
        }
    }

    fn detail(items: Vec<LineItem>, status: InvoiceStatus) -> InvoiceDetail {
        let now = Utc::now();
        let invoice_id = Uuid::new_v4();
        InvoiceDetail {
            invoice: InvoiceView {
                id: invoice_id,
                customer_id: None,
                invoice_number: "INV-0000042".into(),
                customer_name: "Acme Ltd".into(),
                customer_email: "ap@acme.test".into(),
                customer_address: Some("1 Main St\nSpringfield".into()),
                invoice_date: "2024-03-05".parse().unwrap(),
                due_date: "2024-04-04".parse().unwrap(),
                subtotal: dec!(1000.00),
                tax: dec!(0.00),
                total: dec!(1000.00),
                status,
                notes: Some("Thanks for your <b>business</b>".into()),
                items,
                created_at: now,
                updated_at: now,
            },
            payments: vec![payment::Model {
                id: Uuid::new_v4(),
                invoice_id,
                owner_id: Uuid::new_v4(),
                amount: dec!(400.00),
                payment_date: "2024-03-10".parse().unwrap(),
                payment_method: Some(PaymentMethod::Upi),
                notes: None,
                created_at: now,
                updated_at: now,
            }],
            total_paid: dec!(400.00),
            remaining_amount: dec!(600.00),
        }
    }

    #[test]
    fn renders_a_pdf_document() {
        let items = vec![LineItem {
            description: "<p>Landing page &amp; checkout</p>".into(),
            price: dec!(1000.00),
            task_name: Some("Checkout".into()),
            ..Default::default()
        }];
        let bytes = render_invoice_pdf(&detail(items, InvoiceStatus::Paid), &settings("Rs.")).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_item_lists_spill_onto_more_pages() {
        let items = (0..80)
            .map(|i| LineItem {
                description: format!("Line {} with a description long enough to wrap onto a second row of text", i),
                price: dec!(12.50),
                ..Default::default()
            })
            .collect();
        let bytes = render_invoice_pdf(&detail(items, InvoiceStatus::Sent), &settings("Rs.")).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn empty_invoice_still_renders() {
        let bytes = render_invoice_pdf(&detail(vec![], InvoiceStatus::Draft), &settings("$")).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn non_latin_text_renders_with_builtin_fonts() {
        let mut doc = detail(
            vec![LineItem {
                description: "Übersetzung ins Japanische 東京".into(),
                price: dec!(80.00),
                ..Default::default()
            }],
            InvoiceStatus::Sent,
        );
        doc.invoice.customer_name = "Ткаченко Олена".into();
        let bytes = render_invoice_pdf(&doc, &settings("₹")).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn builtin_fonts_replace_unencodable_characters() {
        assert!(matches!(win_ansi("Café – €5"), Cow::Borrowed("Café – €5")));
        assert_eq!(win_ansi("₹ 東京"), "? ??");
        assert_eq!(win_ansi("Олена"), "?????");
    }

    #[test]
    fn missing_font_file_is_an_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PdfSettings {
            currency_label: "Rs.".into(),
            font_path: Some(dir.path().join("absent.ttf")),
            bold_font_path: None,
        };
        let err = render_invoice_pdf(&detail(vec![], InvoiceStatus::Sent), &settings).unwrap_err();
        assert!(matches!(err, ServiceError::InternalError(msg) if msg.contains("absent.ttf")));
    }

    #[test]
    fn strips_markup_from_descriptions() {
        assert_eq!(
            strip_html("<p>Fix <strong>login</strong>&nbsp;bug &amp; tests</p>"),
            "Fix login bug & tests"
        );
        assert_eq!(strip_html("plain text"), "plain text");
    }

    #[test]
    fn wraps_on_word_boundaries() {
        assert_eq!(wrap("one two three", 7), vec!["one two", "three"]);
        assert_eq!(wrap("", 10), vec![String::new()]);
    }

    #[test]
    fn formats_dates_and_amounts() {
        assert_eq!(long_date("2024-03-05".parse().unwrap()), "Mar 05, 2024");
        assert_eq!(amount(dec!(1234.5), "Rs."), "Rs. 1234.50");
        assert_eq!(truncate("abcdefghij", 6), "abc...");
    }
}
