use std::io::BufWriter;

use printpdf::*;

use super::ExportError;
use crate::indicators::IndicatorSummary;
use crate::reporting::ComplianceSummary;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const TOP: f32 = 280.0;
const BOTTOM: f32 = 20.0;

/// Page cursor that starts a new A4 page when the bottom margin is hit.
struct PageWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
    font: IndirectFontRef,
    bold: IndirectFontRef,
}

impl PageWriter {
    fn new(title: &str) -> Result<Self, ExportError> {
        let (doc, page1, layer1) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let layer = doc.get_page(page1).get_layer(layer1);
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ExportError::Pdf(format!("font error: {e}")))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ExportError::Pdf(format!("font error: {e}")))?;
        Ok(Self {
            doc,
            layer,
            y: TOP,
            font,
            bold,
        })
    }

    fn ensure_room(&mut self, needed: f32) {
        if self.y - needed < BOTTOM {
            let (page, layer) = self
                .doc
                .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = TOP;
        }
    }

    fn heading(&mut self, text: &str, size: f32) {
        self.ensure_room(10.0);
        self.layer.use_text(text, size, Mm(20.0), Mm(self.y), &self.bold);
        self.y -= 7.0;
    }

    fn line(&mut self, text: &str) {
        self.ensure_room(5.0);
        self.layer.use_text(text, 9.0, Mm(25.0), Mm(self.y), &self.font);
        self.y -= 4.5;
    }

    fn gap(&mut self, mm: f32) {
        self.y -= mm;
    }

    fn finish(self) -> Result<Vec<u8>, ExportError> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| ExportError::Pdf(format!("save error: {e}")))?;
        buf.into_inner()
            .map_err(|e| ExportError::Pdf(format!("buffer error: {e}")))
    }
}

/// A4 compliance report: indicators, totals, per-stage and per-area tables.
pub fn compliance_report_pdf(
    title: &str,
    period_label: &str,
    summary: &ComplianceSummary,
    indicators: &IndicatorSummary,
) -> Result<Vec<u8>, ExportError> {
    let mut page = PageWriter::new(title)?;

    page.heading(title, 14.0);
    page.line(&format!("Period: {period_label}"));
    page.gap(4.0);

    page.heading("INDICATORS", 11.0);
    for ind in [&indicators.clmc, &indicators.teaem] {
        page.line(&format!(
            "{}: {}% ({}/{}), {} (target {}%)",
            ind.indicator, ind.value, ind.numerator, ind.denominator, ind.band_label, ind.target
        ));
    }
    page.gap(4.0);

    page.heading("TEN CORRECTS", 11.0);
    for field in &indicators.per_field {
        page.line(&format!(
            "{}: {}% ({}/{})",
            field.label, field.percentage, field.true_count, field.total
        ));
    }
    page.gap(4.0);

    page.heading("SUMMARY", 11.0);
    page.line(&format!(
        "Records: {}   Compliant: {}   Compliance: {}%",
        summary.total_records, summary.compliant_records, summary.percentage
    ));
    page.line(&format!(
        "Areas: {}   Stages: {}   Staff: {}",
        summary.distinct_areas, summary.distinct_stages, summary.distinct_users
    ));
    page.gap(4.0);

    if !summary.by_stage.is_empty() {
        page.heading("BY STAGE", 11.0);
        for g in &summary.by_stage {
            page.line(&format!(
                "{}: {}% ({}/{})",
                g.key, g.percentage, g.compliant, g.total
            ));
        }
        page.gap(4.0);
    }

    if !summary.by_area.is_empty() {
        page.heading("BY AREA", 11.0);
        for g in &summary.by_area {
            page.line(&format!(
                "{}: {}% ({}/{})",
                g.key, g.percentage, g.compliant, g.total
            ));
        }
    }

    page.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::indicators::indicator_summary;
    use crate::models::EntryFilter;
    use crate::reporting::compliance_summary;
    use chrono::Utc;

    #[test]
    fn test_pdf_has_magic_header() {
        let conn = open_memory_database().unwrap();
        let summary = compliance_summary(&conn, &EntryFilter::default()).unwrap();
        let indicators = indicator_summary(&conn, 30, &Utc::now()).unwrap();

        let bytes =
            compliance_report_pdf("Compliance report", "last 7 days", &summary, &indicators)
                .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
