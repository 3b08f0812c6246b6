//! 图表配置与分析页的数据加载

use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use crate::core::{ChartData, ColumnDescriptor, ColumnType, FileService, StoredFile};
use crate::validation::FieldErrors;

pub const LOAD_FILES_FAILED: &str = "Failed to load files. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum Dimension {
    #[default]
    #[serde(rename = "2D")]
    TwoD,
    #[serde(rename = "3D")]
    ThreeD,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
    Scatter,
    Area,
    Bar3d,
    Pie3d,
    Scatter3d,
}

impl ChartType {
    pub fn dimension(&self) -> Dimension {
        match self {
            ChartType::Bar3d | ChartType::Pie3d | ChartType::Scatter3d => Dimension::ThreeD,
            _ => Dimension::TwoD,
        }
    }

    pub fn for_dimension(dimension: Dimension) -> &'static [ChartType] {
        match dimension {
            Dimension::TwoD => &[ChartType::Bar, ChartType::Line, ChartType::Pie, ChartType::Scatter, ChartType::Area],
            Dimension::ThreeD => &[ChartType::Bar3d, ChartType::Pie3d, ChartType::Scatter3d],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Sum,
    Average,
    Count,
    Min,
    Max,
}

/// 发送给服务端的图表配置
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    #[serde(rename = "type")]
    pub chart_type: Option<ChartType>,
    pub dimension: Dimension,
    pub title: String,
    pub x_axis: String,
    pub y_axis: String,
    pub aggregation: Aggregation,
}

impl ChartConfig {
    pub fn validate(&self, selected_file: Option<&str>) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        if selected_file.is_none_or(|id| id.is_empty()) {
            errors.add("file", "Please select a file");
        }
        if self.chart_type.is_none() {
            errors.add("chartType", "Please select a chart type");
        }
        if self.title.trim().is_empty() {
            errors.add("title", "Please enter a chart title");
        }
        if self.x_axis.is_empty() {
            errors.add("xAxis", "Please select X-axis");
        }
        if self.y_axis.is_empty() {
            errors.add("yAxis", "Please select Y-axis");
        }

        errors.into_result()
    }
}

/// 分析页状态：文件列表、所选文件的列、生成的图表
pub struct AnalysisSession {
    service: Arc<dyn FileService>,
    files: Vec<StoredFile>,
    selected_file: Option<String>,
    columns: Vec<ColumnDescriptor>,
    chart: Option<ChartData>,
    validation_errors: FieldErrors,
    error: Option<String>,
}

impl AnalysisSession {
    pub fn new(service: Arc<dyn FileService>, file_id: Option<String>) -> Self {
        Self {
            service,
            files: Vec::new(),
            selected_file: file_id,
            columns: Vec::new(),
            chart: None,
            validation_errors: FieldErrors::new(),
            error: None,
        }
    }

    /// 加载文件列表；路由里带了 file id 时顺带加载列结构
    pub async fn load(&mut self) {
        self.error = None;
        match self.service.get_files().await {
            Ok(files) => {
                debug!(count = files.len(), "Fetched files");
                self.files = files;
            }
            Err(err) => {
                warn!("Error fetching files: {}", err);
                self.error = Some(LOAD_FILES_FAILED.to_string());
                return;
            }
        }

        if let Some(file_id) = self.selected_file.clone() {
            self.load_structure(&file_id).await;
        }
    }

    pub async fn select_file(&mut self, file_id: Option<String>) {
        self.selected_file = file_id.filter(|id| !id.is_empty());
        self.chart = None;

        match self.selected_file.clone() {
            Some(file_id) => self.load_structure(&file_id).await,
            None => self.columns.clear(),
        }
    }

    async fn load_structure(&mut self, file_id: &str) {
        match self.service.get_file_structure(file_id).await {
            Ok(structure) => self.columns = structure.columns,
            Err(err) => {
                warn!(file_id, "Error fetching file structure: {}", err);
                self.columns.clear();
                self.error = Some(err.user_message());
            }
        }
    }

    /// 校验通过才会请求服务端
    pub async fn generate_chart(&mut self, config: &ChartConfig) -> Option<&ChartData> {
        if let Err(errors) = config.validate(self.selected_file.as_deref()) {
            self.validation_errors = errors;
            return None;
        }
        self.validation_errors = FieldErrors::new();
        let file_id = self.selected_file.clone()?;

        match self.service.generate_chart(&file_id, config).await {
            Ok(chart) => {
                self.error = None;
                self.chart = Some(chart);
            }
            Err(err) => {
                warn!(file_id = %file_id, "Error generating chart: {}", err);
                self.error = Some(err.user_message());
            }
        }

        self.chart.as_ref()
    }

    pub fn files(&self) -> &[StoredFile] {
        &self.files
    }

    pub fn selected_file(&self) -> Option<&str> {
        self.selected_file.as_deref()
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// 可以作为 Y 轴的数值列
    pub fn numeric_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|col| col.column_type == ColumnType::Number)
    }

    pub fn chart(&self) -> Option<&ChartData> {
        self.chart.as_ref()
    }

    pub fn validation_errors(&self) -> &FieldErrors {
        &self.validation_errors
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
