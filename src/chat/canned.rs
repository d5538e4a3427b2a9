//! Canned answers served by the simulator
//!
//! Entries are checked in order against the lower-cased prompt; the first
//! match wins. Prompts matching nothing get a generic acknowledgement.

use chrono::{DateTime, SecondsFormat, Utc};

/// One keyword-triggered answer
pub struct CannedAnswer {
    pub topic: &'static str,
    pub keywords: &'static [&'static str],
    /// Builds the markdown answer from the lower-cased prompt
    pub answer: fn(&str) -> String,
    pub sql: &'static str,
}

impl CannedAnswer {
    pub fn matches(&self, lower_prompt: &str) -> bool {
        self.keywords.iter().any(|k| lower_prompt.contains(k))
    }
}

/// Priority-ordered answer table
pub const CANNED_ANSWERS: &[CannedAnswer] = &[
    CannedAnswer {
        topic: "sales",
        keywords: &["venta"],
        answer: sales_answer,
        sql: SALES_SQL,
    },
    CannedAnswer {
        topic: "brands",
        keywords: &["marca"],
        answer: brands_answer,
        sql: BRANDS_SQL,
    },
    CannedAnswer {
        topic: "categories",
        keywords: &["categoría", "categoria"],
        answer: categories_answer,
        sql: CATEGORIES_SQL,
    },
];

/// First table entry matching the prompt
pub fn lookup(prompt: &str) -> Option<&'static CannedAnswer> {
    let lower = prompt.to_lowercase();
    CANNED_ANSWERS.iter().find(|entry| entry.matches(&lower))
}

/// Answer text and query traces for `prompt`
pub fn respond(prompt: &str, conversation_id: &str, now: DateTime<Utc>) -> (String, Vec<String>) {
    match lookup(prompt) {
        Some(entry) => {
            let answer = (entry.answer)(&prompt.to_lowercase());
            tracing::debug!(topic = entry.topic, "Serving canned answer");
            (answer, vec![entry.sql.to_string()])
        }
        None => (
            generic_answer(prompt, conversation_id, now),
            vec![GENERIC_SQL.to_string()],
        ),
    }
}

fn sales_answer(lower_prompt: &str) -> String {
    let year = if lower_prompt.contains("2025") {
        " en el año 2025"
    } else {
        ""
    };
    let by_country = if lower_prompt.contains("país") || lower_prompt.contains("pais") {
        " por país"
    } else {
        ""
    };
    format!(
        "### Resumen Ejecutivo
Se realizó la consulta sobre las ventas{year}{by_country}. A continuación, se presentan los resultados consolidados en USD.

### Análisis Detallado
___
| País                   |      Venta en USD |
|------------------------|------------------:|
| Brasil                 | 7.087.617.377    |
| México                 | 1.153.737.063    |
| Argentina              | 1.145.944.066    |
| Colombia               |    313.206.105   |
| Chile                  |    208.478.339   |
___

### Conclusión o Recomendación
- **Brasil** lidera las ventas con una cifra significativamente alta de **7.087 millones USD**, seguido por **México** y **Argentina** con más de **1.100 millones USD** cada uno.
- Este análisis puede ser útil para identificar mercados clave y oportunidades de crecimiento.

Si necesitas un análisis más detallado o comparaciones con otros años, no dudes en pedírmelo."
    )
}

fn brands_answer(_lower_prompt: &str) -> String {
    "### Resumen Ejecutivo
Se analizaron las principales marcas del mercado. A continuación se presentan los resultados del top 5.

### Análisis Detallado
___
| Marca                  |      Venta en USD | Cuota de Mercado |
|------------------------|------------------:|-----------------:|
| Marca A                | 2.500.000.000    | 35.2%            |
| Marca B                | 1.800.000.000    | 25.4%            |
| Marca C                | 1.200.000.000    | 16.9%            |
| Marca D                |    900.000.000   | 12.7%            |
| Marca E                |    700.000.000   |  9.8%            |
___

### Conclusión o Recomendación
Las 5 principales marcas concentran el **100%** del mercado, siendo **Marca A** la líder con más del 35% de participación."
        .to_string()
}

fn categories_answer(_lower_prompt: &str) -> String {
    "### Resumen Ejecutivo
Se analizaron las ventas por categoría. Los resultados muestran una distribución variada entre las diferentes categorías de productos.

### Análisis Detallado
___
| Categoría              |      Venta en USD |
|------------------------|------------------:|
| Sistema Nervioso       | 3.500.000.000    |
| Aparato Cardiovascular | 2.800.000.000    |
| Sistema Digestivo      | 1.900.000.000    |
| Sistema Respiratorio   | 1.200.000.000    |
___

### Conclusión o Recomendación
La categoría de **Sistema Nervioso** presenta las mayores ventas, seguida por **Aparato Cardiovascular**."
        .to_string()
}

fn generic_answer(prompt: &str, conversation_id: &str, now: DateTime<Utc>) -> String {
    let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    format!(
        "### Respuesta Simulada

He recibido tu consulta: \"{prompt}\"

Esta es una respuesta simulada. Para obtener respuestas reales, asegúrate de tener el servicio backend corriendo y desactiva el modo simulado.

**Información de la consulta:**
- Prompt: {prompt}
- ConversationId: {conversation_id}
- Timestamp: {timestamp}

### Nota
El modo simulado está activo. Las respuestas no provienen del backend real."
    )
}

const SALES_SQL: &str = "SELECT
    [dbo].[gld_fact_consolidado].[PAIS] AS [País],
    SUM(CAST([dbo].[gld_fact_consolidado].[USD] AS BIGINT)) AS [Venta en USD]
FROM
    [dbo].[gld_fact_consolidado]
WHERE
    [dbo].[gld_fact_consolidado].[ANIO] = 2025
GROUP BY
    [dbo].[gld_fact_consolidado].[PAIS]
ORDER BY
    [Venta en USD] DESC;";

const BRANDS_SQL: &str = "SELECT TOP 5
    [dbo].[gld_fact_consolidado].[MARCA] AS [Marca],
    SUM(CAST([dbo].[gld_fact_consolidado].[USD] AS BIGINT)) AS [Venta en USD],
    (SUM(CAST([dbo].[gld_fact_consolidado].[USD] AS BIGINT)) * 100.0 /
     (SELECT SUM(CAST([USD] AS BIGINT)) FROM [dbo].[gld_fact_consolidado])) AS [Cuota de Mercado]
FROM
    [dbo].[gld_fact_consolidado]
GROUP BY
    [dbo].[gld_fact_consolidado].[MARCA]
ORDER BY
    [Venta en USD] DESC;";

const CATEGORIES_SQL: &str = "SELECT
    [dbo].[gld_fact_consolidado].[ATC1_DES] AS [Categoría],
    SUM(CAST([dbo].[gld_fact_consolidado].[USD] AS BIGINT)) AS [Venta en USD]
FROM
    [dbo].[gld_fact_consolidado]
GROUP BY
    [dbo].[gld_fact_consolidado].[ATC1_DES]
ORDER BY
    [Venta en USD] DESC;";

const GENERIC_SQL: &str = "-- Query SQL simulada
SELECT
    COUNT(*) AS total_registros
FROM
    [dbo].[gld_fact_consolidado]
WHERE
    1 = 1;";
