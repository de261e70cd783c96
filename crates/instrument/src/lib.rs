//! The fragility classifier (component B) and instrumentation pass
//! (component C): together they rewrite a stylesheet DOM so that its
//! execution becomes observable without changing what it outputs.

pub mod classify;
mod error;
mod pass;

pub use classify::Decision;
pub use error::InstrumentError;
pub use pass::{instrument, InstrumentReport};

#[cfg(test)]
mod tests {
    use super::*;
    use xdbg_dom::Dom;
    use xdbg_types::EngineKind;

    const STYLESHEET: &str = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="/">
    <xsl:variable name="itemCount" select="count(/items/item)"/>
    <out><xsl:value-of select="$itemCount"/></out>
  </xsl:template>
</xsl:stylesheet>"#;

    #[test]
    fn instruments_template_body_and_variable() {
        let mut dom = Dom::parse(STYLESHEET).unwrap();
        let report = instrument(&mut dom, EngineKind::Legacy).unwrap();
        assert!(report.probes_inserted > 0);
        assert_eq!(report.variables_captured, 1);
        assert!(report.diagnostics.is_empty());
        let out = dom.serialize();
        assert!(out.contains("dbg:break"));
        assert!(out.contains("dbg:var"));
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let mut dom = Dom::parse(STYLESHEET).unwrap();
        instrument(&mut dom, EngineKind::Legacy).unwrap();
        let first_pass = dom.serialize();
        let second = instrument(&mut dom, EngineKind::Legacy).unwrap();
        assert_eq!(second.probes_inserted, 0);
        assert_eq!(second.variables_captured, 0);
        assert_eq!(dom.serialize(), first_pass);
    }

    #[test]
    fn legacy_backend_refuses_xslt_2_0() {
        let xslt2 = STYLESHEET.replace("version=\"1.0\"", "version=\"2.0\"");
        let mut dom = Dom::parse(&xslt2).unwrap();
        let err = instrument(&mut dom, EngineKind::Legacy).unwrap_err();
        assert!(matches!(err, InstrumentError::UnsupportedVersionForLegacy(_)));
    }

    #[test]
    fn attribute_content_is_never_instrumented() {
        let xslt = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
  <xsl:template match="/">
    <out>
      <xsl:attribute name="id"><xsl:value-of select="@id"/></xsl:attribute>
    </out>
  </xsl:template>
</xsl:stylesheet>"#;
        let mut dom = Dom::parse(xslt).unwrap();
        instrument(&mut dom, EngineKind::Modern).unwrap();
        let out = dom.serialize();
        let attr_start = out.find("<xsl:attribute").unwrap();
        let attr_end = out.find("</xsl:attribute>").unwrap();
        assert!(!out[attr_start..attr_end].contains("dbg:"));
    }
}
