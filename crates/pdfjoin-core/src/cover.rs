//! Cover page generation
//!
//! The cover summarizes the plan, not the PDF: title, lender block,
//! timestamp, compliance line, match count and the enumerated document list.
//! Lists that do not fit on one page continue on further pages.

use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use shared_types::{LenderRequirements, PlanSummary};

use crate::error::PdfJoinError;

const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;
const MARGIN: i64 = 72;
const LINE_HEIGHT: i64 = 16;
const MAX_LINE_CHARS: usize = 90;

pub const COVER_TITLE: &str = "Reorganized Closing Package";

#[derive(Debug, Clone)]
pub struct CoverPage {
    pub title: String,
    pub lender_name: String,
    pub contact_name: String,
    pub contact_email: String,
    pub funding_amount: String,
    pub generated_at: DateTime<Utc>,
    pub summary: PlanSummary,
}

impl CoverPage {
    pub fn new(summary: PlanSummary, requirements: &LenderRequirements) -> Self {
        Self {
            title: COVER_TITLE.to_string(),
            lender_name: requirements.lender_name.clone(),
            contact_name: requirements.contact_name.clone(),
            contact_email: requirements.contact_email.clone(),
            funding_amount: requirements.funding_amount.clone(),
            generated_at: Utc::now(),
            summary,
        }
    }

    /// Text lines in display order, with the font size for each
    pub fn lines(&self) -> Vec<(i64, String)> {
        let mut lines = vec![
            (20, self.title.clone()),
            (12, String::new()),
            (12, format!("Lender: {}", self.lender_name)),
            (
                12,
                format!("Contact: {} <{}>", self.contact_name, self.contact_email),
            ),
            (12, format!("Funding amount: {}", self.funding_amount)),
            (
                12,
                format!(
                    "Generated: {}",
                    self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
                ),
            ),
            (12, String::new()),
            (
                14,
                format!("Compliance score: {}%", self.summary.compliance_score),
            ),
        ];

        let matched = if self.summary.documents_required > 0 {
            format!(
                "Documents matched: {} of {} required",
                self.summary.documents_matched, self.summary.documents_required
            )
        } else {
            format!("Documents matched: {}", self.summary.documents_matched)
        };
        lines.push((12, matched));
        lines.push((12, String::new()));
        lines.push((14, "Documents in this package".to_string()));

        for (i, name) in self.summary.document_list.iter().enumerate() {
            lines.push((11, format!("{}. {}", i + 1, name)));
        }
        lines
    }

    pub fn render(&self) -> Result<Document, PdfJoinError> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(b"Helvetica".to_vec())),
            ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
        ]));
        let resources_id = doc.add_object(Dictionary::from_iter(vec![(
            "Font",
            Object::Dictionary(Dictionary::from_iter(vec![("F1", Object::Reference(font_id))])),
        )]));

        let mut page_ids: Vec<ObjectId> = Vec::new();
        for chunk in paginate(self.lines()) {
            let content = Content {
                operations: page_operations(&chunk),
            };
            let encoded = content
                .encode()
                .map_err(|e| PdfJoinError::OperationError(format!("Cover encoding failed: {}", e)))?;
            let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

            page_ids.push(doc.add_object(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                (
                    "MediaBox",
                    Object::Array(vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(PAGE_WIDTH),
                        Object::Integer(PAGE_HEIGHT),
                    ]),
                ),
                ("Resources", Object::Reference(resources_id)),
                ("Contents", Object::Reference(content_id)),
            ])));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Count", Object::Integer(page_ids.len() as i64)),
                (
                    "Kids",
                    Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
                ),
            ])),
        );
        let catalog_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc.compress();
        Ok(doc)
    }

    pub fn render_to_bytes(&self) -> Result<Vec<u8>, PdfJoinError> {
        let mut doc = self.render()?;
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|e| PdfJoinError::OperationError(format!("Save failed: {}", e)))?;
        Ok(buffer)
    }
}

/// Split lines into pages by the vertical space they need
fn paginate(lines: Vec<(i64, String)>) -> Vec<Vec<(i64, String)>> {
    let usable = PAGE_HEIGHT - 2 * MARGIN;
    let mut pages = vec![Vec::new()];
    let mut used = 0;

    for line in lines {
        let height = line.0.max(LINE_HEIGHT);
        if used + height > usable {
            pages.push(Vec::new());
            used = 0;
        }
        used += height;
        if let Some(page) = pages.last_mut() {
            page.push(line);
        }
    }
    pages
}

fn page_operations(lines: &[(i64, String)]) -> Vec<Operation> {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Td",
            vec![Object::Integer(MARGIN), Object::Integer(PAGE_HEIGHT - MARGIN)],
        ),
    ];
    for (size, text) in lines {
        operations.push(Operation::new(
            "Tf",
            vec![Object::Name(b"F1".to_vec()), Object::Integer(*size)],
        ));
        operations.push(Operation::new(
            "Td",
            vec![Object::Integer(0), Object::Integer(-(*size).max(LINE_HEIGHT))],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(pdf_text(text), StringFormat::Literal)],
        ));
    }
    operations.push(Operation::new("ET", vec![]));
    operations
}

/// Latin-1 bytes for the standard font; other characters become '?'
fn pdf_text(text: &str) -> Vec<u8> {
    text.chars()
        .take(MAX_LINE_CHARS)
        .map(|c| match c as u32 {
            0x20..=0x7e | 0xa0..=0xff => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}
