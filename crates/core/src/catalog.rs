//! Static field catalogs shared by the form state and the remote service.

use serde::{Deserialize, Serialize};

/// How an input parameter is entered and displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// Monetary amount or plain quantity.
    Currency,
    /// Percentage in the `0..=100` range.
    Percentage,
}

/// How a derived output is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayKind {
    /// Monetary amount (`R$`).
    Currency,
    /// Percentage value.
    Percentage,
    /// Duration in months.
    Months,
}

/// A user-supplied project assumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputField {
    /// Unique key used on the wire.
    pub key: &'static str,
    /// Form label.
    pub label: &'static str,
    /// Help text shown when the field is focused.
    pub tooltip: &'static str,
    /// Entry/display kind.
    pub kind: InputKind,
    /// Spreadsheet cell written by the remote service.
    pub cell: &'static str,
}

impl InputField {
    /// Upper bound hinted to the UI. Nothing enforces it.
    pub fn max_value(&self) -> Option<f64> {
        match self.kind {
            InputKind::Percentage => Some(100.0),
            InputKind::Currency => None,
        }
    }

    /// Sheet-qualified cell reference, e.g. `INPUTS!C7`.
    pub fn cell_ref(&self) -> String {
        format!("{INPUT_SHEET}!{}", self.cell)
    }
}

/// A metric computed by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputField {
    /// Unique key used on the wire.
    pub key: &'static str,
    /// Card label.
    pub label: &'static str,
    /// Rendering kind.
    pub display: DisplayKind,
    /// Spreadsheet cell the value is read from.
    pub cell: &'static str,
}

/// Sheet holding the input cells.
pub const INPUT_SHEET: &str = "INPUTS";

/// The twelve input parameters, in form order.
pub const INPUT_FIELDS: [InputField; 12] = [
    InputField {
        key: "operacao_total",
        label: "OPERAÇÃO TOTAL",
        tooltip: "Valor total financiado",
        kind: InputKind::Currency,
        cell: "C7",
    },
    InputField {
        key: "financiamento",
        label: "FINANCIAMENTO",
        tooltip: "Valor do financiamento do projeto",
        kind: InputKind::Currency,
        cell: "D8",
    },
    InputField {
        key: "metragem_terreno",
        label: "METRAGEM TERRENO",
        tooltip: "Área total do terreno em m²",
        kind: InputKind::Currency,
        cell: "C13",
    },
    InputField {
        key: "metragem_total_venda",
        label: "METRAGEM TOTAL - VENDA",
        tooltip: "Área total disponível para venda",
        kind: InputKind::Currency,
        cell: "C14",
    },
    InputField {
        key: "metragem_equivalente_construcao",
        label: "METRAGEM EQUIVALENTE DE CONSTRUÇÃO",
        tooltip: "Área equivalente de construção",
        kind: InputKind::Currency,
        cell: "C15",
    },
    InputField {
        key: "custo_m2_construcao",
        label: "CUSTO/M² CONSTRUÇÃO",
        tooltip: "Custo por metro quadrado de construção",
        kind: InputKind::Currency,
        cell: "C16",
    },
    InputField {
        key: "preco_m2_venda",
        label: "PREÇO/M² ESPERADO DE VENDA",
        tooltip: "Preço esperado por metro quadrado para venda",
        kind: InputKind::Currency,
        cell: "C17",
    },
    InputField {
        key: "preco_terreno",
        label: "PREÇO TERRENO",
        tooltip: "Valor total do terreno",
        kind: InputKind::Currency,
        cell: "C19",
    },
    InputField {
        key: "custo_construcao",
        label: "CUSTO CONSTRUÇÃO",
        tooltip: "Custo total da construção",
        kind: InputKind::Currency,
        cell: "D21",
    },
    InputField {
        key: "custo_construcao_prazo",
        label: "CUSTO CONSTRUÇÃO PRAZO",
        tooltip: "Prazo da construção",
        kind: InputKind::Currency,
        cell: "E21",
    },
    InputField {
        key: "taxa_performance",
        label: "TAXA DE PERFORMANCE (%)",
        tooltip: "Taxa de performance do projeto",
        kind: InputKind::Percentage,
        cell: "C24",
    },
    InputField {
        key: "corretagem",
        label: "CORRETAGEM (%)",
        tooltip: "Taxa de corretagem",
        kind: InputKind::Percentage,
        cell: "C27",
    },
];

/// The nine derived metrics, in card order.
pub const OUTPUT_FIELDS: [OutputField; 9] = [
    OutputField {
        key: "exposicao_caixa",
        label: "EXPOSIÇÃO DE CAIXA",
        display: DisplayKind::Currency,
        cell: "E3",
    },
    OutputField {
        key: "meses_payback",
        label: "MESES PAYBACK",
        display: DisplayKind::Months,
        cell: "E4",
    },
    OutputField {
        key: "corretagem_venda",
        label: "CORRETAGEM",
        display: DisplayKind::Currency,
        cell: "E5",
    },
    OutputField {
        key: "taxa_sucesso",
        label: "TAXA DE SUCESSO",
        display: DisplayKind::Currency,
        cell: "E6",
    },
    OutputField {
        key: "lucro_bruto",
        label: "LUCRO BRUTO",
        display: DisplayKind::Currency,
        cell: "E7",
    },
    OutputField {
        key: "ir_ganho_capital",
        label: "I.R. CAPITAL",
        display: DisplayKind::Currency,
        cell: "E8",
    },
    OutputField {
        key: "lucro_liquido",
        label: "LUCRO LÍQUIDO",
        display: DisplayKind::Currency,
        cell: "E9",
    },
    OutputField {
        key: "roi",
        label: "ROI",
        display: DisplayKind::Percentage,
        cell: "E10",
    },
    OutputField {
        key: "tir_mensal",
        label: "TIR MENSAL",
        display: DisplayKind::Percentage,
        cell: "E11",
    },
];

/// Look up an input field by key.
pub fn input_field(key: &str) -> Option<&'static InputField> {
    INPUT_FIELDS.iter().find(|field| field.key == key)
}

/// Look up an output field by key.
pub fn output_field(key: &str) -> Option<&'static OutputField> {
    OUTPUT_FIELDS.iter().find(|field| field.key == key)
}
