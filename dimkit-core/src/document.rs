use std::collections::HashMap;

use glam::{DAffine2, DVec2, DVec3};
use serde::{Deserialize, Serialize};

use crate::geometry::{Point2, Vector2};
use crate::nurbs::{NurbsCurve3d, NurbsError};

/// 多行文字行距系数（相对字高）。
const MTEXT_LINE_SPACING: f64 = 5.0 / 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Entity {
    Line(Line),
    Ray(Ray),
    XLine(XLine),
    Circle(Circle),
    Arc(Arc),
    Ellipse(Ellipse),
    Polyline(Polyline),
    Spline(Spline),
    Text(Text),
    MText(MText),
    Leader(Leader),
    MLeader(MLeader),
    Dimension(Dimension),
    BlockReference(BlockReference),
}

impl Entity {
    pub fn type_name(&self) -> &'static str {
        match self {
            Entity::Line(_) => "LINE",
            Entity::Ray(_) => "RAY",
            Entity::XLine(_) => "XLINE",
            Entity::Circle(_) => "CIRCLE",
            Entity::Arc(_) => "ARC",
            Entity::Ellipse(_) => "ELLIPSE",
            Entity::Polyline(_) => "LWPOLYLINE",
            Entity::Spline(_) => "SPLINE",
            Entity::Text(_) => "TEXT",
            Entity::MText(_) => "MTEXT",
            Entity::Leader(_) => "LEADER",
            Entity::MLeader(_) => "MULTILEADER",
            Entity::Dimension(_) => "DIMENSION",
            Entity::BlockReference(_) => "INSERT",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub start: Point2,
    pub end: Point2,
}

/// 射线：自基点沿方向无限延伸。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ray {
    pub base: Point2,
    pub direction: Vector2,
}

/// 构造线：沿方向双向无限延伸。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XLine {
    pub base: Point2,
    pub direction: Vector2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point2,
    pub radius: f64,
}

/// 圆弧实体，角度以弧度形式储存，遵循数学正方向。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arc {
    pub center: Point2,
    pub radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
}

/// 椭圆实体，记录主轴向量与参数范围（单位为弧度）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ellipse {
    pub center: Point2,
    pub major_axis: Vector2,
    pub ratio: f64,
    pub start_parameter: f64,
    pub end_parameter: f64,
}

impl Ellipse {
    pub fn point_at(&self, parameter: f64) -> DVec2 {
        let major = self.major_axis.as_vec2();
        let minor = major.perp() * self.ratio;
        self.center.as_vec2() + major * parameter.cos() + minor * parameter.sin()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolylineVertex {
    pub position: Point2,
    pub bulge: f64,
}

impl PolylineVertex {
    #[inline]
    pub fn new(position: Point2) -> Self {
        Self {
            position,
            bulge: 0.0,
        }
    }

    #[inline]
    pub fn with_bulge(position: Point2, bulge: f64) -> Self {
        Self { position, bulge }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polyline {
    pub vertices: Vec<PolylineVertex>,
    pub is_closed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spline {
    pub degree: i32,
    pub control_points: Vec<Point2>,
    pub knot_values: Vec<f64>,
    pub weights: Vec<f64>,
}

impl Spline {
    pub fn to_nurbs(&self) -> Result<NurbsCurve3d, NurbsError> {
        let degree = usize::try_from(self.degree)
            .map_err(|_| NurbsError::InvalidDefinition(format!("degree {}", self.degree)))?;
        let points = self
            .control_points
            .iter()
            .map(|p| p.as_vec2().extend(0.0))
            .collect::<Vec<DVec3>>();
        NurbsCurve3d::new(degree, self.knot_values.clone(), points, self.weights.clone())
    }
}

/// 单行文字。`insert` 为左下基点。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Text {
    pub insert: Point2,
    pub content: String,
    pub height: f64,
    pub rotation: f64,
    pub width_factor: f64,
}

impl Text {
    pub fn bounding_quad(&self) -> [DVec2; 4] {
        let width = estimated_width(&self.content, self.height) * self.width_factor;
        oriented_box(
            self.insert.as_vec2(),
            DVec2::from_angle(self.rotation),
            width,
            self.height,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MText {
    pub insert: Point2,
    pub content: String,
    pub height: f64,
    pub reference_width: Option<f64>,
    pub direction: Vector2,
    /// 1..9，依次为左上、中上、右上……右下。
    pub attachment_point: i16,
}

impl MText {
    pub fn bounding_quad(&self) -> [DVec2; 4] {
        let lines: Vec<&str> = self.content.split('\n').collect();
        let width = self.reference_width.unwrap_or_else(|| {
            lines
                .iter()
                .map(|line| estimated_width(line, self.height))
                .fold(0.0, f64::max)
        });
        let height = self.height * (1.0 + (lines.len().saturating_sub(1)) as f64 * MTEXT_LINE_SPACING);
        let dir = self.direction.as_vec2().try_normalize().unwrap_or(DVec2::X);
        let up = dir.perp();
        let attachment = (self.attachment_point.clamp(1, 9) - 1) as usize;
        let (column, row) = (attachment % 3, attachment / 3);
        let dx = width * column as f64 / 2.0;
        let dy = height * (2 - row) as f64 / 2.0;
        let origin = self.insert.as_vec2() - dir * dx - up * dy;
        oriented_box(origin, dir, width, height)
    }
}

/// 引线。`hookline` 为最后一个顶点沿注释方向延伸的钩线长度。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Leader {
    pub vertices: Vec<Point2>,
    pub has_arrowhead: bool,
    pub annotation_direction: Vector2,
    pub hookline: Option<f64>,
}

impl Leader {
    pub fn hookline_segment(&self) -> Option<(DVec2, DVec2)> {
        let length = self.hookline?;
        let last = self.vertices.last()?.as_vec2();
        let dir = self.annotation_direction.as_vec2().try_normalize()?;
        Some((last, last + dir * length))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderLine {
    pub vertices: Vec<Point2>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MLeaderContent {
    MText { text: String, location: Point2 },
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLeader {
    pub leader_lines: Vec<LeaderLine>,
    pub content: MLeaderContent,
    pub text_height: Option<f64>,
    #[serde(default)]
    pub has_dogleg: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dogleg_length: Option<f64>,
}

impl MLeader {
    /// 狗腿线：自各引线末点朝向内容位置水平延伸。
    pub fn dogleg_segments(&self) -> Vec<(DVec2, DVec2)> {
        let (true, Some(length)) = (self.has_dogleg, self.dogleg_length) else {
            return Vec::new();
        };
        let target = match &self.content {
            MLeaderContent::MText { location, .. } => Some(location.as_vec2()),
            MLeaderContent::None => None,
        };
        self.leader_lines
            .iter()
            .filter_map(|line| line.vertices.last().map(|p| p.as_vec2()))
            .map(|end| {
                let sign = match target {
                    Some(target) if target.x < end.x => -1.0,
                    _ => 1.0,
                };
                (end, end + DVec2::X * length * sign)
            })
            .collect()
    }

    pub fn text_quad(&self) -> Option<[DVec2; 4]> {
        match &self.content {
            MLeaderContent::MText { text, location } => {
                let height = self.text_height.unwrap_or(1.0);
                let mtext = MText {
                    insert: *location,
                    content: text.clone(),
                    height,
                    reference_width: None,
                    direction: Vector2::new(1.0, 0.0),
                    attachment_point: 1,
                };
                Some(mtext.bounding_quad())
            }
            MLeaderContent::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum DimensionKind {
    Linear,
    Aligned,
    Angular,
    Diameter,
    Radius,
    Angular3Point,
    Ordinate,
}

/// 标注实体，几何由匿名块 `block_name` 承载（块内坐标即世界坐标）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dimension {
    pub kind: DimensionKind,
    pub definition_point: Point2,
    pub text_midpoint: Point2,
    pub block_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    pub tag: String,
    pub text: String,
    pub insert: Point2,
    pub height: f64,
    pub rotation: f64,
    pub width_factor: f64,
}

impl Attribute {
    pub fn as_text(&self) -> Text {
        Text {
            insert: self.insert,
            content: self.text.clone(),
            height: self.height,
            rotation: self.rotation,
            width_factor: self.width_factor,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockReference {
    pub name: String,
    pub insert: Point2,
    pub scale: Vector2,
    pub rotation: f64,
    /// 属性已在世界坐标系中定位。
    pub attributes: Vec<Attribute>,
}

impl BlockReference {
    /// 块空间到引用空间的变换：平移(insert)·旋转·缩放·平移(-base_point)。
    pub fn transform(&self, base_point: Point2) -> DAffine2 {
        DAffine2::from_scale_angle_translation(
            self.scale.as_vec2(),
            self.rotation,
            self.insert.as_vec2(),
        ) * DAffine2::from_translation(-base_point.as_vec2())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDefinition {
    pub name: String,
    pub base_point: Point2,
    pub entities: Vec<Entity>,
}

/// 对象路径：顶层实体 ID 加逐层块内实体索引。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectPath {
    pub root: EntityId,
    pub nested: Vec<usize>,
}

impl ObjectPath {
    pub fn top_level(root: EntityId) -> Self {
        Self {
            root,
            nested: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Drawing {
    entities: Vec<(EntityId, Entity)>,
    next_entity_id: u64,
    blocks: HashMap<String, BlockDefinition>,
}

impl Drawing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&mut self, entity: Entity) -> EntityId {
        let id = self.next_id();
        self.entities.push((id, entity));
        id
    }

    pub fn add_line(&mut self, start: Point2, end: Point2) -> EntityId {
        self.add_entity(Entity::Line(Line { start, end }))
    }

    pub fn add_text(
        &mut self,
        insert: Point2,
        content: impl Into<String>,
        height: f64,
        rotation: f64,
    ) -> EntityId {
        self.add_entity(Entity::Text(Text {
            insert,
            content: content.into(),
            height,
            rotation,
            width_factor: 1.0,
        }))
    }

    pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
        self.entities.iter()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities
            .iter()
            .find(|(entity_id, _)| *entity_id == id)
            .map(|(_, entity)| entity)
    }

    pub fn add_block_definition(&mut self, definition: BlockDefinition) {
        self.blocks.insert(definition.name.clone(), definition);
    }

    pub fn block(&self, name: &str) -> Option<&BlockDefinition> {
        self.blocks.get(name)
    }

    /// 沿路径解析实体，返回实体及其块空间到世界空间的累积变换。
    /// 块参照按插入变换进入下一层，标注进入其匿名块（不附加变换）。
    pub fn resolve_path(&self, path: &ObjectPath) -> Option<(&Entity, DAffine2)> {
        let mut current = self.entity(path.root)?;
        let mut transform = DAffine2::IDENTITY;
        for index in &path.nested {
            let (block, local) = match current {
                Entity::BlockReference(reference) => {
                    let block = self.block(&reference.name)?;
                    (block, reference.transform(block.base_point))
                }
                Entity::Dimension(dimension) => (self.block(&dimension.block_name)?, DAffine2::IDENTITY),
                _ => return None,
            };
            transform = transform * local;
            current = block.entities.get(*index)?;
        }
        Some((current, transform))
    }

    #[inline]
    fn next_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        EntityId(id)
    }
}

/// 估算文字宽度：CJK 字符按字高计，其余按 0.6 倍字高。
pub fn estimated_width(content: &str, height: f64) -> f64 {
    content
        .chars()
        .map(|c| if is_cjk(c) { height } else { height * 0.6 })
        .sum()
}

fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}')
}

/// 以左下角、方向、宽高构造逆时针四边形。
pub fn oriented_box(origin: DVec2, direction: DVec2, width: f64, height: f64) -> [DVec2; 4] {
    let dir = direction.try_normalize().unwrap_or(DVec2::X);
    let up = dir.perp();
    [
        origin,
        origin + dir * width,
        origin + dir * width + up * height,
        origin + up * height,
    ]
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use super::*;

    #[test]
    fn drawing_assigns_sequential_ids() {
        let mut drawing = Drawing::new();
        let first = drawing.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0));
        let second = drawing.add_text(Point2::new(1.0, 1.0), "AB", 2.0, 0.0);
        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
        assert_eq!(drawing.entities().count(), 2);
        match drawing.entity(second) {
            Some(Entity::Text(text)) => assert_eq!(text.content, "AB"),
            other => panic!("unexpected entity lookup result: {other:?}"),
        }
    }

    #[test]
    fn text_quad_respects_rotation() {
        let text = Text {
            insert: Point2::new(1.0, 1.0),
            content: "ABCDE".to_string(),
            height: 2.0,
            rotation: FRAC_PI_2,
            width_factor: 1.0,
        };
        let quad = text.bounding_quad();
        assert!((quad[1] - DVec2::new(1.0, 7.0)).length() < 1e-9);
        assert!((quad[3] - DVec2::new(-1.0, 1.0)).length() < 1e-9);
    }

    #[test]
    fn mtext_quad_uses_attachment_point() {
        let mtext = MText {
            insert: Point2::new(10.0, 10.0),
            content: "X".to_string(),
            height: 2.0,
            reference_width: Some(4.0),
            direction: Vector2::new(1.0, 0.0),
            attachment_point: 5,
        };
        let quad = mtext.bounding_quad();
        assert!((quad[0] - DVec2::new(8.0, 9.0)).length() < 1e-9);
        assert!((quad[2] - DVec2::new(12.0, 11.0)).length() < 1e-9);
    }

    #[test]
    fn resolve_path_composes_block_transforms() {
        let mut drawing = Drawing::new();
        drawing.add_block_definition(BlockDefinition {
            name: "INNER".to_string(),
            base_point: Point2::new(0.0, 0.0),
            entities: vec![Entity::Line(Line {
                start: Point2::new(0.0, 0.0),
                end: Point2::new(1.0, 0.0),
            })],
        });
        drawing.add_block_definition(BlockDefinition {
            name: "OUTER".to_string(),
            base_point: Point2::new(0.0, 0.0),
            entities: vec![Entity::BlockReference(BlockReference {
                name: "INNER".to_string(),
                insert: Point2::new(5.0, 0.0),
                scale: Vector2::new(2.0, 2.0),
                rotation: 0.0,
                attributes: Vec::new(),
            })],
        });
        let root = drawing.add_entity(Entity::BlockReference(BlockReference {
            name: "OUTER".to_string(),
            insert: Point2::new(0.0, 10.0),
            scale: Vector2::new(1.0, 1.0),
            rotation: FRAC_PI_2,
            attributes: Vec::new(),
        }));

        let path = ObjectPath {
            root,
            nested: vec![0, 0],
        };
        let (entity, transform) = drawing.resolve_path(&path).expect("resolve nested line");
        assert!(matches!(entity, Entity::Line(_)));
        let end = transform.transform_point2(DVec2::new(1.0, 0.0));
        assert!((end - DVec2::new(0.0, 17.0)).length() < 1e-9);

        let missing = ObjectPath {
            root,
            nested: vec![3],
        };
        assert!(drawing.resolve_path(&missing).is_none());
    }
}
